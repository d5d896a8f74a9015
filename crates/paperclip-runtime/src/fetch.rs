//! Download of a default model when none is installed.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use paperclip_core::list_model_names;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Overrides the default model URL.
pub const DEFAULT_GGUF_URL_ENV: &str = "PAPERCLIP_DEFAULT_GGUF_URL";

/// Overrides the file name the default model is saved as.
pub const DEFAULT_GGUF_FILE_ENV: &str = "PAPERCLIP_DEFAULT_GGUF_FILE";

pub const DEFAULT_GGUF_URL: &str = "https://huggingface.co/TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF/resolve/main/tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf";
pub const DEFAULT_GGUF_FILE: &str = "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf";

/// Progress callback, called with (`downloaded_bytes`, `total_bytes`).
///
/// `total_bytes` is 0 when the server did not announce a length.
pub type ProgressCallback<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Where the default model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSource {
    pub url: String,
    pub file_name: String,
}

impl Default for FetchSource {
    fn default() -> Self {
        Self {
            url: DEFAULT_GGUF_URL.to_string(),
            file_name: DEFAULT_GGUF_FILE.to_string(),
        }
    }
}

impl FetchSource {
    /// The default source with environment overrides applied.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v: &String| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            url: non_empty(DEFAULT_GGUF_URL_ENV).unwrap_or(defaults.url),
            file_name: non_empty(DEFAULT_GGUF_FILE_ENV).unwrap_or(defaults.file_name),
        }
    }
}

/// What [`fetch_default_model`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A model was already installed.
    Skipped { existing: String },
    Downloaded { path: PathBuf, bytes: u64 },
}

/// Download `source` into `models_dir` unless a model is already there.
///
/// The body is streamed to `<file>.part` and renamed once complete; the
/// partial file is removed on failure. Redirects are followed.
pub async fn fetch_default_model(
    models_dir: &Path,
    source: &FetchSource,
    force: bool,
    progress: Option<ProgressCallback<'_>>,
) -> Result<FetchOutcome> {
    if !force {
        if let Some(existing) = list_model_names(models_dir).into_iter().next() {
            info!(model = %existing, "A model is already installed, skipping download");
            return Ok(FetchOutcome::Skipped { existing });
        }
    }
    if source.file_name.contains(['/', '\\']) || source.file_name.trim().is_empty() {
        bail!("Invalid model file name '{}'", source.file_name);
    }

    tokio::fs::create_dir_all(models_dir)
        .await
        .with_context(|| format!("Failed to create models directory {}", models_dir.display()))?;

    let dest = models_dir.join(&source.file_name);
    let partial = models_dir.join(format!("{}.part", source.file_name));
    info!(url = %source.url, dest = %dest.display(), "Fetching default model");

    match download(&source.url, &partial, progress).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, &dest)
                .await
                .with_context(|| format!("Failed to move download to {}", dest.display()))?;
            info!(path = %dest.display(), bytes, "Model downloaded");
            Ok(FetchOutcome::Downloaded { path: dest, bytes })
        }
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                debug!(path = %partial.display(), error = %rm, "No partial download to remove");
            }
            warn!(error = %e, "Model download failed");
            Err(e)
        }
    }
}

async fn download(url: &str, dest: &Path, progress: Option<ProgressCallback<'_>>) -> Result<u64> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("paperclip/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to start download")?;

    if !response.status().is_success() {
        bail!("Download failed: HTTP {}", response.status());
    }

    let total = response.content_length().unwrap_or(0);
    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading download stream")?;
        file.write_all(&chunk)
            .await
            .context("Error writing to download file")?;
        downloaded += chunk.len() as u64;
        if let Some(cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().await.context("Error flushing download file")?;

    if total > 0 && downloaded != total {
        bail!("Download incomplete: got {downloaded} of {total} bytes");
    }
    Ok(downloaded)
}
