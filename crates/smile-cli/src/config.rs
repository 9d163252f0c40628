use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration: optional TOML file (`SMILE_CONFIG`), then `SMILE_*`
/// environment variables, then defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Face-analysis endpoint accepting `DetectFaces` requests.
    pub analysis_endpoint: String,
    /// Opaque bearer credential for the analysis endpoint.
    pub analysis_token: Option<String>,
    /// Directory used by the save picker. `None` disables the modern save path.
    pub save_dir: Option<PathBuf>,
    /// Where fallback downloads land.
    pub download_dir: PathBuf,
    /// Filename used by the download fallback.
    pub fallback_filename: String,
    /// Stem of the name suggested to the save picker.
    pub suggested_name: String,
}

/// Values read from the TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    analysis_endpoint: Option<String>,
    analysis_token: Option<String>,
    save_dir: Option<PathBuf>,
    download_dir: Option<PathBuf>,
    fallback_filename: Option<String>,
    suggested_name: Option<String>,
}

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/detect-faces";
const DEFAULT_NAME: &str = "mysmile";

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let file = match env("SMILE_CONFIG") {
            Some(path) => load_file(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let download_dir = env("SMILE_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .or(file.download_dir)
            .or_else(|| env("XDG_DOWNLOAD_DIR").map(PathBuf::from))
            .unwrap_or_else(|| {
                let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join("Downloads")
            });

        Ok(Self {
            analysis_endpoint: env("SMILE_ANALYSIS_ENDPOINT")
                .or(file.analysis_endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            analysis_token: env("SMILE_ANALYSIS_TOKEN")
                .or(file.analysis_token)
                .filter(|t| !t.trim().is_empty()),
            save_dir: env("SMILE_SAVE_DIR")
                .map(PathBuf::from)
                .or(file.save_dir)
                .filter(|p| !p.as_os_str().is_empty()),
            download_dir,
            fallback_filename: env("SMILE_FALLBACK_FILENAME")
                .or(file.fallback_filename)
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            suggested_name: env("SMILE_SUGGESTED_NAME")
                .or(file.suggested_name)
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        })
    }
}

fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}
