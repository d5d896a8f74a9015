//! Capability detection: pick the inference backend once at startup.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use paperclip_core::InferenceBackend;
use paperclip_core::paths::{LLAMA_SERVER_BINARY, llama_server_path};
use tracing::{debug, info, warn};

use super::{LlamaServerBackend, RemoteEndpointBackend, UnavailableBackend};

/// URL of an already running OpenAI-compatible server.
pub const LLAMA_URL_ENV: &str = "PAPERCLIP_LLAMA_URL";

/// Explicit llama-server binary.
pub const LLAMA_SERVER_ENV: &str = "PAPERCLIP_LLAMA_SERVER";

/// Inputs to backend detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOptions {
    pub llama_url: Option<String>,
    pub llama_server: Option<PathBuf>,
}

impl BackendOptions {
    /// Read the options from `PAPERCLIP_LLAMA_URL` / `PAPERCLIP_LLAMA_SERVER`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v: &String| !v.trim().is_empty());
        Self {
            llama_url: non_empty(LLAMA_URL_ENV),
            llama_server: non_empty(LLAMA_SERVER_ENV).map(PathBuf::from),
        }
    }
}

/// Outcome of detection, before any backend is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    Remote(String),
    LlamaServer(PathBuf),
    Unavailable(String),
}

/// Decide which backend to use.
///
/// Order: explicit endpoint URL, explicit binary, managed binary under the
/// data root, `llama-server` on `PATH`, otherwise unavailable.
pub fn choose_backend(options: &BackendOptions) -> BackendChoice {
    if let Some(url) = options.llama_url.as_deref().map(str::trim) {
        if !url.is_empty() {
            return BackendChoice::Remote(url.to_string());
        }
    }

    if let Some(path) = &options.llama_server {
        match validate_binary(path) {
            Ok(()) => return BackendChoice::LlamaServer(path.clone()),
            Err(reason) => warn!(%reason, "Configured llama-server unusable, searching elsewhere"),
        }
    }

    if let Ok(managed) = llama_server_path() {
        if validate_binary(&managed).is_ok() {
            return BackendChoice::LlamaServer(managed);
        }
        debug!(path = %managed.display(), "No managed llama-server");
    }

    if let Ok(found) = which::which(LLAMA_SERVER_BINARY) {
        return BackendChoice::LlamaServer(found);
    }

    BackendChoice::Unavailable(format!(
        "{LLAMA_SERVER_BINARY} not found (set {LLAMA_SERVER_ENV} or {LLAMA_URL_ENV})"
    ))
}

/// Build the backend chosen by [`choose_backend`].
pub fn detect_backend(options: &BackendOptions) -> Arc<dyn InferenceBackend> {
    match choose_backend(options) {
        BackendChoice::Remote(url) => {
            info!(%url, "Using remote inference endpoint");
            Arc::new(RemoteEndpointBackend::new(url))
        }
        BackendChoice::LlamaServer(path) => {
            info!(path = %path.display(), "Using llama-server");
            Arc::new(LlamaServerBackend::new(path))
        }
        BackendChoice::Unavailable(reason) => {
            warn!(%reason, "No inference backend, demo mode only");
            Arc::new(UnavailableBackend::new(reason))
        }
    }
}

/// Check that `path` is an executable file.
fn validate_binary(path: &Path) -> Result<(), String> {
    which::which(path)
        .map(drop)
        .map_err(|e| format!("{}: {e}", path.display()))
}
