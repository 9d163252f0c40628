//! Face analysis client.
//!
//! Wraps a remote face-detection capability behind [`FaceAnalysisBackend`].
//! Failures are never propagated: they are logged and turned into
//! [`AnalysisOutcome::Absent`], which downstream scoring treats as
//! "no contributing scores". This silently degrades the score instead of
//! surfacing an error to the user, so callers that need to tell the two
//! apart must inspect the outcome rather than the score.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service rejected request: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Attribute-selection directive sent with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeSelection {
    Default,
    All,
}

/// Boolean facial attribute with the service's confidence in it (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoolAttribute {
    pub value: bool,
    pub confidence: f64,
}

/// One detected emotion, e.g. `HAPPY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Emotion {
    #[serde(rename = "Type")]
    pub kind: String,
    pub confidence: f64,
}

/// Per-face attributes. Only the smile-related fields are typed; everything
/// else the service returns is carried through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceDetail {
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub smile: Option<BoolAttribute>,
    #[serde(default)]
    pub mouth_open: Option<BoolAttribute>,
    #[serde(default)]
    pub emotions: Vec<Emotion>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FaceDetail {
    /// Confidence of the named emotion, if the service reported it.
    pub fn emotion(&self, kind: &str) -> Option<f64> {
        self.emotions
            .iter()
            .find(|e| e.kind.eq_ignore_ascii_case(kind))
            .map(|e| e.confidence)
    }
}

/// Full result of one face-analysis call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceAttributes {
    #[serde(default)]
    pub face_details: Vec<FaceDetail>,
}

impl FaceAttributes {
    /// The face the service is most confident about.
    pub fn primary_face(&self) -> Option<&FaceDetail> {
        self.face_details.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Result of [`FaceAnalysisClient::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Detected(FaceAttributes),
    /// The call failed; the reason has already been logged.
    Absent { reason: String },
}

impl AnalysisOutcome {
    pub fn attributes(&self) -> Option<&FaceAttributes> {
        match self {
            AnalysisOutcome::Detected(attrs) => Some(attrs),
            AnalysisOutcome::Absent { .. } => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, AnalysisOutcome::Absent { .. })
    }
}

/// A network-backed face-detection capability.
#[async_trait]
pub trait FaceAnalysisBackend: Send + Sync {
    async fn detect_faces(
        &self,
        image: &[u8],
        attributes: AttributeSelection,
    ) -> Result<FaceAttributes, AnalysisError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Thin adapter over a shared, read-only backend.
#[derive(Clone)]
pub struct FaceAnalysisClient {
    backend: Arc<dyn FaceAnalysisBackend>,
}

impl FaceAnalysisClient {
    pub fn new(backend: Arc<dyn FaceAnalysisBackend>) -> Self {
        Self { backend }
    }

    /// Run one detection requesting all attributes. Never retries, never errors.
    pub async fn analyze(&self, image: &[u8]) -> AnalysisOutcome {
        match self
            .backend
            .detect_faces(image, AttributeSelection::All)
            .await
        {
            Ok(attrs) => {
                tracing::info!(
                    backend = self.backend.name(),
                    faces = attrs.face_details.len(),
                    "face analysis complete"
                );
                AnalysisOutcome::Detected(attrs)
            }
            Err(err) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %err,
                    "face analysis failed; continuing without a result"
                );
                AnalysisOutcome::Absent {
                    reason: err.to_string(),
                }
            }
        }
    }
}
