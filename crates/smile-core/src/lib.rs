//! smile-core — Smile scoring pipeline.
//!
//! Decodes a captured face image, sends it to a remote face-analysis
//! service, folds the smile-related attributes into a single score and
//! saves the image through whichever save capability the environment offers.

pub mod analysis;
pub mod decoder;
pub mod desktop;
pub mod persist;
pub mod pipeline;
pub mod remote;
pub mod score;
pub mod signals;
pub mod types;

pub use analysis::{AnalysisOutcome, FaceAnalysisBackend, FaceAnalysisClient, FaceAttributes};
pub use decoder::{decode, DecoderError};
pub use desktop::DesktopEnvironment;
pub use persist::{persist, PersistError, SaveEnvironment, SaveOptions};
pub use pipeline::{Orchestrator, PipelineError, SmileReport};
pub use remote::HttpFaceBackend;
pub use score::aggregate;
pub use types::{FinalScore, ImageBytes, ImageSource, PersistableArtifact};
