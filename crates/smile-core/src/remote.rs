//! HTTP face-analysis backend speaking the `DetectFaces` JSON shape.
//!
//! Request:  `{"Image":{"Bytes":"<base64>"},"Attributes":["ALL"]}`
//! Response: `{"FaceDetails":[{...}]}`
//!
//! Credentials are opaque: an optional bearer token is attached as-is.

use crate::analysis::{AnalysisError, AttributeSelection, FaceAnalysisBackend, FaceAttributes};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DetectFacesRequest {
    image: ImagePayload,
    attributes: [AttributeSelection; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImagePayload {
    bytes: String,
}

/// Face-analysis backend reached over HTTP.
///
/// Built once and shared read-only between pipeline runs.
pub struct HttpFaceBackend {
    endpoint: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl HttpFaceBackend {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, AnalysisError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(AnalysisError::Transport(
                "analysis endpoint must not be empty".to_string(),
            ));
        }
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint,
            token,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FaceAnalysisBackend for HttpFaceBackend {
    async fn detect_faces(
        &self,
        image: &[u8],
        attributes: AttributeSelection,
    ) -> Result<FaceAttributes, AnalysisError> {
        let body = DetectFacesRequest {
            image: ImagePayload {
                bytes: STANDARD.encode(image),
            },
            attributes: [attributes],
        };

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(endpoint = %self.endpoint, bytes = image.len(), "sending DetectFaces request");

        let response = request
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AnalysisError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }

        parse_response(&text)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn parse_response(text: &str) -> Result<FaceAttributes, AnalysisError> {
    serde_json::from_str(text).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
}
