//! Smile pipeline: decode → analyze → score → persist.

use crate::analysis::{AnalysisOutcome, FaceAnalysisBackend, FaceAnalysisClient};
use crate::decoder::{self, DecoderError};
use crate::persist::{self, FileTypeFilter, PersistError, SaveEnvironment, SaveOptions};
use crate::score;
use crate::signals;
use crate::types::{FinalScore, ImageBytes, ImageSource, PersistableArtifact};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Decoder(#[from] DecoderError),
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmileReport {
    pub score: FinalScore,
    pub sub_scores: Vec<f64>,
    pub faces: usize,
    pub image_bytes: usize,
    pub mime_type: Option<String>,
    /// Set when face analysis failed; the score then reflects no contributions.
    pub analysis_failure: Option<String>,
    pub saved: bool,
}

/// Owns the analysis client for the whole session and runs the pipeline.
pub struct Orchestrator {
    client: FaceAnalysisClient,
    save_options: SaveOptions,
    suggested_stem: String,
}

impl Orchestrator {
    /// Build the orchestrator around a backend constructed once by the caller.
    pub fn new(backend: Arc<dyn FaceAnalysisBackend>) -> Self {
        Self {
            client: FaceAnalysisClient::new(backend),
            save_options: SaveOptions::default(),
            suggested_stem: persist::DEFAULT_FALLBACK_NAME.to_string(),
        }
    }

    pub fn with_save_options(mut self, options: SaveOptions) -> Self {
        self.save_options = options;
        self
    }

    /// Stem of the name suggested to the picker; the extension follows the image format.
    pub fn with_suggested_stem(mut self, stem: impl Into<String>) -> Self {
        self.suggested_stem = stem.into();
        self
    }

    /// Decode, analyze and score without saving anything.
    pub async fn score(&self, source: ImageSource) -> Result<(ImageBytes, SmileReport), PipelineError> {
        let declared_mime = match &source {
            ImageSource::Embedded { mime_type, .. } => Some(mime_type.clone()),
            ImageSource::Uri { .. } => None,
        };

        let image = decoder::decode(source).await?;
        let mime_type = image
            .sniff_format()
            .map(|(mime, _)| mime.to_string())
            .or(declared_mime);

        let outcome = self.client.analyze(image.as_slice()).await;
        let sub_scores = signals::outcome_scores(&outcome);
        let score = score::aggregate(&sub_scores);

        let (faces, analysis_failure) = match &outcome {
            AnalysisOutcome::Detected(attrs) => (attrs.face_details.len(), None),
            AnalysisOutcome::Absent { reason } => (0, Some(reason.clone())),
        };

        tracing::info!(
            score,
            faces,
            sub_scores = ?sub_scores,
            degraded = analysis_failure.is_some(),
            "smile scored"
        );

        let report = SmileReport {
            score,
            sub_scores,
            faces,
            image_bytes: image.len(),
            mime_type,
            analysis_failure,
            saved: false,
        };
        Ok((image, report))
    }

    /// Full run: score the image, then save it through `env`.
    pub async fn run(
        &self,
        source: ImageSource,
        env: &dyn SaveEnvironment,
    ) -> Result<SmileReport, PipelineError> {
        let (image, mut report) = self.score(source).await?;
        let (artifact, options) = self.artifact_for(image, &report);
        persist::persist(env, artifact, &options).await?;
        report.saved = true;
        Ok(report)
    }

    fn artifact_for(&self, image: ImageBytes, report: &SmileReport) -> (PersistableArtifact, SaveOptions) {
        let mut options = self.save_options.clone();
        let sniffed = image.sniff_format();
        let name = match sniffed {
            Some((_, ext)) => format!("{}.{ext}", self.suggested_stem),
            None => self.suggested_stem.clone(),
        };
        if let Some((mime, ext)) = sniffed {
            if options.types.is_empty() {
                options.types.push(FileTypeFilter {
                    description: format!("{} image", ext.to_ascii_uppercase()),
                    mime_type: mime.to_string(),
                    extensions: vec![ext.to_string()],
                });
            }
        }
        let mut artifact = PersistableArtifact::new(image.into_vec(), name);
        if let Some(mime) = &report.mime_type {
            artifact = artifact.with_mime_type(mime.clone());
        }
        (artifact, options)
    }
}
