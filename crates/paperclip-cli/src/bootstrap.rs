//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - Paths (data root, config file, models directory)
//! - The persisted config store
//! - The inference backend, chosen once by capability detection
//! - The assistant service on top of them
//!
//! Command handlers receive the composed [`CliContext`] and delegate to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use paperclip_core::paths::ResolvedPaths;
use paperclip_core::{ConfigStore, InferenceBackend, JsonConfigStore};
use paperclip_runtime::{AssistantService, BackendOptions, detect_backend};
use tracing_subscriber::EnvFilter;

use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Explicit models directory (`--models-dir`).
    pub models_dir: Option<String>,
    pub backend: BackendOptions,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            models_dir: cli.models_dir.clone(),
            backend: BackendOptions {
                llama_url: cli.llama_url.clone(),
                llama_server: cli.llama_server.as_deref().map(PathBuf::from),
            },
        }
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    service: Arc<AssistantService>,
    paths: ResolvedPaths,
}

impl CliContext {
    pub fn new(service: AssistantService, paths: ResolvedPaths) -> Self {
        Self {
            service: Arc::new(service),
            paths,
        }
    }

    pub const fn service(&self) -> &Arc<AssistantService> {
        &self.service
    }

    pub const fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    pub fn models_dir(&self) -> &Path {
        &self.paths.models_dir
    }
}

/// Bootstrap the CLI application.
///
/// Resolves paths, opens the config file and detects the backend. Nothing
/// is loaded yet; handlers that need a model call
/// [`AssistantService::initialize`].
pub fn bootstrap(config: &CliConfig) -> Result<CliContext> {
    let paths = ResolvedPaths::resolve(config.models_dir.as_deref())
        .context("Failed to resolve paperclip paths")?;
    let store: Arc<dyn ConfigStore> = Arc::new(JsonConfigStore::new(&paths.config_path));
    let backend: Arc<dyn InferenceBackend> = detect_backend(&config.backend);

    let service = AssistantService::new(backend, store, &paths.models_dir);
    Ok(CliContext::new(service, paths))
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` selects debug and the default
/// is warnings only, so logs stay out of the streamed replies.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

/// Load `.env` from the working directory or a parent, if present.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::parse_from([
            "paperclip",
            "--models-dir",
            "/srv/models",
            "--llama-server",
            "/opt/llama/llama-server",
            "paths",
        ]);
        let config = CliConfig::from_cli(&cli);
        assert_eq!(config.models_dir.as_deref(), Some("/srv/models"));
        assert_eq!(
            config.backend.llama_server,
            Some(PathBuf::from("/opt/llama/llama-server"))
        );
    }
}
