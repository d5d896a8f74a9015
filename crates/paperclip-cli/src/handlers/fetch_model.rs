//! Fetch-model command handler.
//!
//! Downloads a small default model so the assistant has something to load.

use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use paperclip_core::ensure_directory;
use paperclip_runtime::fetch::ProgressCallback;
use paperclip_runtime::{FetchOutcome, FetchSource, fetch_default_model};

use crate::error::CliError;

/// Arguments for the fetch-model command.
#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    pub url: Option<String>,
    pub file: Option<String>,
    pub force: bool,
}

impl FetchArgs {
    /// Environment defaults with the flags applied on top.
    pub fn source(&self) -> FetchSource {
        let mut source = FetchSource::from_env();
        if let Some(url) = &self.url {
            source.url.clone_from(url);
        }
        if let Some(file) = &self.file {
            source.file_name.clone_from(file);
        }
        source
    }
}

/// Execute the fetch-model command.
pub async fn execute(models_dir: &Path, args: &FetchArgs) -> Result<()> {
    let source = args.source();
    ensure_directory(models_dir).map_err(|e| CliError::Io(e.to_string()))?;
    println!("Downloading {} to {}", source.file_name, models_dir.display());

    let bar = ProgressBar::new(0);
    bar.set_style(download_style());
    let progress: ProgressCallback<'_> = &|downloaded, total| {
        if total > 0 && bar.length() != Some(total) {
            bar.set_length(total);
        }
        bar.set_position(downloaded);
    };

    let outcome = fetch_default_model(models_dir, &source, args.force, Some(progress)).await;
    bar.finish_and_clear();

    match outcome.map_err(|e| CliError::Service(format!("{e:#}")))? {
        FetchOutcome::Skipped { existing } => {
            println!("A model is already installed: {existing} (use --force to download anyway)");
        }
        FetchOutcome::Downloaded { path, bytes } => {
            println!(
                "✓ Saved {} ({})",
                path.display(),
                indicatif::HumanBytes(bytes)
            );
        }
    }
    Ok(())
}

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
        )
        .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("█▓░"))
}
