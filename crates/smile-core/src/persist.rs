//! Result persistence across capability tiers.
//!
//! A save environment may expose a modern "save file picker" that hands back a
//! writable file handle. When it does not, the legacy path offers the payload
//! as a plain download under a fixed filename. The probe runs once per
//! [`persist`] call and picks exactly one [`Saver`].

use crate::types::PersistableArtifact;
use async_trait::async_trait;
use thiserror::Error;

/// Filename used by the legacy download path when none is configured.
pub const DEFAULT_FALLBACK_NAME: &str = "mysmile";

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("save picker failed: {0}")]
    Picker(String),
    #[error("failed to open writable stream for {target}: {reason}")]
    Open { target: String, reason: String },
    #[error("write to {target} failed: {reason}")]
    Write { target: String, reason: String },
    #[error("closing {target} failed: {reason}")]
    Close { target: String, reason: String },
}

/// One accepted file type offered by the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeFilter {
    pub description: String,
    pub mime_type: String,
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
}

/// Picker and fallback configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub types: Vec<FileTypeFilter>,
    pub fallback_name: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
        }
    }
}

impl SaveOptions {
    pub fn with_type(mut self, filter: FileTypeFilter) -> Self {
        self.types.push(filter);
        self
    }

    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = name.into();
        self
    }
}

/// Open-write-close stream obtained from a [`FileHandle`].
#[async_trait]
pub trait WritableStream: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), PersistError>;
    async fn close(&mut self) -> Result<(), PersistError>;
}

/// A user-chosen save target.
#[async_trait]
pub trait FileHandle: Send + Sync {
    async fn create_writable(&self) -> Result<Box<dyn WritableStream>, PersistError>;
    fn name(&self) -> String;
}

/// Modern capability: negotiate a save target with the user.
#[async_trait]
pub trait SaveFilePicker: Send + Sync {
    /// `Ok(None)` means the user cancelled.
    async fn show_save_file_picker(
        &self,
        suggested_name: &str,
        types: &[FileTypeFilter],
    ) -> Result<Option<Box<dyn FileHandle>>, PersistError>;
}

/// Legacy capability: offer bytes as a download. Has no failure signal.
#[async_trait]
pub trait DownloadTrigger: Send + Sync {
    async fn trigger_download(&self, body: &[u8], filename: &str);
}

/// What the executing environment provides for saving files.
pub trait SaveEnvironment: Send + Sync {
    /// Capability probe. `None` when no modern picker is available.
    fn save_file_picker(&self) -> Option<&dyn SaveFilePicker>;
    fn download_trigger(&self) -> &dyn DownloadTrigger;
}

/// A persistence strategy selected by [`probe`].
#[async_trait]
pub trait Saver: Send + Sync {
    async fn save(
        &self,
        artifact: &PersistableArtifact,
        options: &SaveOptions,
    ) -> Result<(), PersistError>;

    fn kind(&self) -> &'static str;
}

/// Writes through a picker-provided handle.
pub struct ModernSaver<'a> {
    picker: &'a dyn SaveFilePicker,
}

impl<'a> ModernSaver<'a> {
    pub fn new(picker: &'a dyn SaveFilePicker) -> Self {
        Self { picker }
    }
}

#[async_trait]
impl Saver for ModernSaver<'_> {
    async fn save(
        &self,
        artifact: &PersistableArtifact,
        options: &SaveOptions,
    ) -> Result<(), PersistError> {
        let Some(handle) = self
            .picker
            .show_save_file_picker(&artifact.suggested_name, &options.types)
            .await?
        else {
            tracing::info!("save picker cancelled by user");
            return Ok(());
        };

        let target = handle.name();
        let mut stream = handle.create_writable().await?;

        // The stream is closed whether or not the write succeeded.
        let written = stream.write(&artifact.body).await;
        let closed = stream.close().await;

        match (written, closed) {
            (Ok(()), Ok(())) => {
                tracing::info!(file = %target, bytes = artifact.body.len(), "artifact saved");
                Ok(())
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(write_err), Err(close_err)) => {
                tracing::warn!(file = %target, error = %write_err, "write failed before close");
                Err(close_err)
            }
        }
    }

    fn kind(&self) -> &'static str {
        "modern"
    }
}

/// Offers the artifact as a download under the configured fallback name.
pub struct FallbackSaver<'a> {
    trigger: &'a dyn DownloadTrigger,
}

impl<'a> FallbackSaver<'a> {
    pub fn new(trigger: &'a dyn DownloadTrigger) -> Self {
        Self { trigger }
    }
}

#[async_trait]
impl Saver for FallbackSaver<'_> {
    async fn save(
        &self,
        artifact: &PersistableArtifact,
        options: &SaveOptions,
    ) -> Result<(), PersistError> {
        tracing::info!(
            filename = %options.fallback_name,
            bytes = artifact.body.len(),
            "save picker unavailable; using download fallback"
        );
        self.trigger
            .trigger_download(&artifact.body, &options.fallback_name)
            .await;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "fallback"
    }
}

/// Pick the saver for this environment.
pub fn probe(env: &dyn SaveEnvironment) -> Box<dyn Saver + '_> {
    match env.save_file_picker() {
        Some(picker) => Box::new(ModernSaver::new(picker)),
        None => Box::new(FallbackSaver::new(env.download_trigger())),
    }
}

/// Save an artifact using whichever strategy the environment supports.
///
/// A cancelled picker counts as success. Write and close failures on the
/// modern path are returned; the fallback path cannot fail observably.
pub async fn persist(
    env: &dyn SaveEnvironment,
    artifact: PersistableArtifact,
    options: &SaveOptions,
) -> Result<(), PersistError> {
    let saver = probe(env);
    tracing::debug!(strategy = saver.kind(), "persisting artifact");
    saver.save(&artifact, options).await
}
