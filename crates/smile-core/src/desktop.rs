//! Native save environment.
//!
//! The modern tier is a directory-backed picker: the suggested name is
//! resolved inside a configured save directory and written through a
//! `tokio::fs::File`. The legacy tier behaves like a browser download: the
//! body is staged in a private temp file and then linked into the downloads
//! directory under the fallback name, de-duplicated as `name (1)`, `name (2)`.

use crate::persist::{
    DownloadTrigger, FileHandle, FileTypeFilter, PersistError, SaveEnvironment, SaveFilePicker,
    WritableStream,
};
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const MAX_DUPLICATE_SUFFIX: u32 = 1000;

/// Save environment backed by the local filesystem.
pub struct DesktopEnvironment {
    picker: Option<DirectoryPicker>,
    downloader: Downloader,
}

impl DesktopEnvironment {
    /// `save_dir = None` leaves the modern capability unavailable.
    pub fn new(save_dir: Option<PathBuf>, download_dir: PathBuf) -> Self {
        Self {
            picker: save_dir.map(DirectoryPicker::new),
            downloader: Downloader::new(download_dir),
        }
    }
}

impl SaveEnvironment for DesktopEnvironment {
    fn save_file_picker(&self) -> Option<&dyn SaveFilePicker> {
        self.picker.as_ref().map(|p| p as &dyn SaveFilePicker)
    }

    fn download_trigger(&self) -> &dyn DownloadTrigger {
        &self.downloader
    }
}

/// Picker that always "chooses" `<dir>/<suggested name>`.
pub struct DirectoryPicker {
    dir: PathBuf,
}

impl DirectoryPicker {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl SaveFilePicker for DirectoryPicker {
    async fn show_save_file_picker(
        &self,
        suggested_name: &str,
        types: &[FileTypeFilter],
    ) -> Result<Option<Box<dyn FileHandle>>, PersistError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistError::Picker(format!("{}: {e}", self.dir.display())))?;
        let name = with_accepted_extension(&sanitize_file_name(suggested_name), types);
        let path = self.dir.join(name);
        tracing::debug!(path = %path.display(), "save target chosen");
        Ok(Some(Box::new(FsFileHandle { path })))
    }
}

/// Handle to a file on disk.
pub struct FsFileHandle {
    path: PathBuf,
}

#[async_trait]
impl FileHandle for FsFileHandle {
    async fn create_writable(&self) -> Result<Box<dyn WritableStream>, PersistError> {
        let file = tokio::fs::File::create(&self.path)
            .await
            .map_err(|e| PersistError::Open {
                target: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(FsWritableStream {
            file: Some(file),
            path: self.path.clone(),
        }))
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Writable stream over a file. `close` flushes, syncs and drops the file.
pub struct FsWritableStream {
    file: Option<tokio::fs::File>,
    path: PathBuf,
}

impl FsWritableStream {
    fn target(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl WritableStream for FsWritableStream {
    async fn write(&mut self, data: &[u8]) -> Result<(), PersistError> {
        let target = self.target();
        let file = self.file.as_mut().ok_or_else(|| PersistError::Write {
            target: target.clone(),
            reason: "stream already closed".to_string(),
        })?;
        file.write_all(data).await.map_err(|e| PersistError::Write {
            target,
            reason: e.to_string(),
        })
    }

    async fn close(&mut self) -> Result<(), PersistError> {
        let target = self.target();
        let Some(mut file) = self.file.take() else {
            return Err(PersistError::Close {
                target,
                reason: "stream already closed".to_string(),
            });
        };
        let close_err = |e: std::io::Error| PersistError::Close {
            target: target.clone(),
            reason: e.to_string(),
        };
        file.flush().await.map_err(close_err)?;
        file.sync_all().await.map_err(close_err)?;
        Ok(())
    }
}

/// Download trigger writing into a downloads directory.
pub struct Downloader {
    dir: PathBuf,
}

impl Downloader {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    async fn download(&self, body: &[u8], filename: &str) -> std::io::Result<PathBuf> {
        let dir = self.dir.clone();
        let body = body.to_vec();
        let name = sanitize_file_name(filename);
        tokio::task::spawn_blocking(move || place_download(&dir, &body, &name, MAX_DUPLICATE_SUFFIX))
            .await
            .map_err(std::io::Error::other)?
    }
}

/// Stage `body` in a private temp file inside `dir`, then link it under the
/// first free name among `name`, `name (1)`, ... `name (max_suffix - 1)`.
///
/// Each name is claimed with a no-clobber link, so concurrent downloads never
/// share a staging file or overwrite each other. The staged file is removed
/// on every failure path.
fn place_download(dir: &Path, body: &[u8], name: &str, max_suffix: u32) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(dir)?;
    staged.write_all(body)?;
    staged.as_file().sync_all()?;

    for candidate in candidate_names(name, max_suffix) {
        let dest = dir.join(candidate);
        match staged.persist_noclobber(&dest) {
            Ok(_) => return Ok(dest),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => staged = e.file,
            Err(e) => return Err(e.error),
        }
    }
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {name} in {}", dir.display()),
    ))
}

/// `name`, then browser-style `stem (n).ext` variants.
fn candidate_names(name: &str, max_suffix: u32) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    std::iter::once(name.to_string()).chain((1..max_suffix).map(move |n| match ext {
        Some(ext) => format!("{stem} ({n}).{ext}"),
        None => format!("{stem} ({n})"),
    }))
}

#[async_trait]
impl DownloadTrigger for Downloader {
    async fn trigger_download(&self, body: &[u8], filename: &str) {
        match self.download(body, filename).await {
            Ok(path) => tracing::info!(path = %path.display(), "download saved"),
            Err(e) => tracing::warn!(dir = %self.dir.display(), error = %e, "download failed"),
        }
    }
}

/// Keep only the final path component and replace separators.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        crate::persist::DEFAULT_FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Append the first accepted extension when the name carries none of them.
fn with_accepted_extension(name: &str, types: &[FileTypeFilter]) -> String {
    let accepted: Vec<&str> = types
        .iter()
        .flat_map(|t| t.extensions.iter().map(String::as_str))
        .collect();
    let Some(first) = accepted.first() else {
        return name.to_string();
    };
    let current = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match current {
        Some(ext) if accepted.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => name.to_string(),
        _ => format!("{name}.{first}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{persist, SaveOptions};
    use crate::types::PersistableArtifact;
    use std::sync::Arc;

    fn png_filter() -> FileTypeFilter {
        FileTypeFilter {
            description: "PNG image".into(),
            mime_type: "image/png".into(),
            extensions: vec!["png".into()],
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize_file_name("  smile.png "), "smile.png");
        assert_eq!(sanitize_file_name("..."), "mysmile");
        assert_eq!(sanitize_file_name(""), "mysmile");
    }

    #[test]
    fn test_extension_appended_when_missing() {
        assert_eq!(with_accepted_extension("mysmile", &[png_filter()]), "mysmile.png");
        assert_eq!(with_accepted_extension("face.PNG", &[png_filter()]), "face.PNG");
        assert_eq!(with_accepted_extension("face.jpg", &[png_filter()]), "face.jpg.png");
        assert_eq!(with_accepted_extension("face", &[]), "face");
    }

    #[tokio::test]
    async fn test_modern_path_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = DesktopEnvironment::new(
            Some(dir.path().join("saved")),
            dir.path().join("downloads"),
        );
        let artifact = PersistableArtifact::new(vec![9, 8, 7], "smile-42");
        let options = SaveOptions::default().with_type(png_filter());

        persist(&env, artifact, &options).await.unwrap();

        let saved = std::fs::read(dir.path().join("saved/smile-42.png")).unwrap();
        assert_eq!(saved, vec![9, 8, 7]);
        assert!(!dir.path().join("downloads").exists());
    }

    #[tokio::test]
    async fn test_fallback_path_downloads_with_fixed_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloads = dir.path().join("downloads");
        let env = DesktopEnvironment::new(None, downloads.clone());

        persist(
            &env,
            PersistableArtifact::new(vec![1, 2], "smile-42.png"),
            &SaveOptions::default(),
        )
        .await
        .unwrap();
        persist(
            &env,
            PersistableArtifact::new(vec![3, 4], "smile-43.png"),
            &SaveOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(downloads.join("mysmile")).unwrap(), vec![1, 2]);
        assert_eq!(std::fs::read(downloads.join("mysmile (1)")).unwrap(), vec![3, 4]);
        // No staging files left behind.
        let leftovers = std::fs::read_dir(&downloads)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_candidate_names_keep_extension() {
        let names: Vec<String> = candidate_names("smile.png", 3).collect();
        assert_eq!(names, vec!["smile.png", "smile (1).png", "smile (2).png"]);
        let names: Vec<String> = candidate_names("mysmile", 2).collect();
        assert_eq!(names, vec!["mysmile", "mysmile (1)"]);
    }

    #[test]
    fn test_duplicate_download_gets_next_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("smile.png"), b"x").unwrap();
        let path = place_download(dir.path(), b"new", "smile.png", MAX_DUPLICATE_SUFFIX).unwrap();
        assert_eq!(path, dir.path().join("smile (1).png"));
        assert_eq!(std::fs::read(dir.path().join("smile.png")).unwrap(), b"x");
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_exhausted_names_error_without_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("mysmile"), b"first").unwrap();
        std::fs::write(dir.path().join("mysmile (1)"), b"second").unwrap();

        let err = place_download(dir.path(), b"third", "mysmile", 2).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(dir.path().join("mysmile")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join("mysmile (1)")).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fallback_saves_are_independent() {
        for _ in 0..50 {
            let dir = tempfile::tempdir().expect("tempdir");
            let env = Arc::new(DesktopEnvironment::new(None, dir.path().to_path_buf()));

            let runs: Vec<_> = [0xAAu8, 0xBB]
                .into_iter()
                .map(|fill| {
                    let env = env.clone();
                    tokio::spawn(async move {
                        let artifact = PersistableArtifact::new(vec![fill; 256 * 1024], "smile.png");
                        persist(env.as_ref(), artifact, &SaveOptions::default()).await
                    })
                })
                .collect();
            for run in runs {
                run.await.expect("join").unwrap();
            }

            let mut fills: Vec<u8> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| {
                    let bytes = std::fs::read(e.unwrap().path()).unwrap();
                    assert_eq!(bytes.len(), 256 * 1024);
                    assert!(bytes.iter().all(|&b| b == bytes[0]));
                    bytes[0]
                })
                .collect();
            fills.sort_unstable();
            assert_eq!(fills, vec![0xAA, 0xBB]);
        }
    }

    #[tokio::test]
    async fn test_stream_close_twice_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = FsFileHandle {
            path: dir.path().join("out.bin"),
        };
        let mut stream = handle.create_writable().await.unwrap();
        stream.write(b"abc").await.unwrap();
        stream.close().await.unwrap();
        assert!(matches!(
            stream.close().await,
            Err(PersistError::Close { .. })
        ));
        assert!(matches!(
            stream.write(b"more").await,
            Err(PersistError::Write { .. })
        ));
        assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_unwritable_save_dir_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // A regular file where the save directory should be.
        let env = DesktopEnvironment::new(Some(blocker), dir.path().join("downloads"));
        let err = persist(
            &env,
            PersistableArtifact::new(vec![1], "smile"),
            &SaveOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PersistError::Picker(_)));
    }
}
