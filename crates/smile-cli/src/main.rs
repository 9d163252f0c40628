use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smile_core::persist::SaveOptions;
use smile_core::{DesktopEnvironment, HttpFaceBackend, ImageSource, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "smile", about = "Score the smile in a face image")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an image, print its smile score and save it
    Score {
        /// Image path, file:// or http(s):// URL, or data: URI
        source: String,
        /// MIME type for a data: URI without one
        #[arg(long)]
        mime: Option<String>,
        /// Print the score without saving the image
        #[arg(long)]
        no_save: bool,
    },
    /// Aggregate sub-scores (0–100) into a smile score
    Aggregate {
        #[arg(required = true)]
        scores: Vec<f64>,
    },
    /// Decode an image source and write its raw bytes
    Decode {
        source: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            source,
            mime,
            no_save,
        } => {
            let config = Config::from_env()?;
            let backend = HttpFaceBackend::new(
                config.analysis_endpoint.clone(),
                config.analysis_token.clone(),
            )?;
            tracing::info!(endpoint = backend.endpoint(), "analysis backend ready");

            let orchestrator = Orchestrator::new(Arc::new(backend))
                .with_suggested_stem(config.suggested_name.clone())
                .with_save_options(
                    SaveOptions::default().with_fallback_name(config.fallback_filename.clone()),
                );
            let source = ImageSource::from_arg(&source, mime.as_deref());

            let report = if no_save {
                orchestrator.score(source).await?.1
            } else {
                let env = DesktopEnvironment::new(config.save_dir.clone(), config.download_dir.clone());
                orchestrator.run(source, &env).await?
            };

            if let Some(reason) = &report.analysis_failure {
                tracing::warn!(reason = %reason, "face analysis failed; score reflects no faces");
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Aggregate { scores } => {
            println!("{}", smile_core::aggregate(&scores));
        }
        Commands::Decode { source, output } => {
            let bytes = smile_core::decode(ImageSource::from_arg(&source, None)).await?;
            std::fs::write(&output, bytes.as_slice())
                .with_context(|| format!("writing {}", output.display()))?;
            tracing::info!(path = %output.display(), bytes = bytes.len(), "image decoded");
        }
    }

    Ok(())
}
