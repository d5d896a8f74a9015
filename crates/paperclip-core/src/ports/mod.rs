//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP or process types in any signature
//! - Config persistence never fails the caller: `load` recovers with defaults
//! - One fixed method set for inference, whatever the backend is

pub mod config_store;
pub mod inference;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use config_store::ConfigStore;
pub use inference::{
    ChatContext, InferenceBackend, InferenceError, LoadParams, LoadedModel, TokenSink,
};

/// Errors raised while reading or writing the persisted configuration.
///
/// These are recovered (defaults on read, a warning on write) and only
/// surface through [`ConfigStore::try_save`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file does not exist yet.
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Filesystem failure other than a missing file.
    #[error("I/O error on {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// The file is not JSON.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The configuration could not be encoded.
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

impl ConfigError {
    /// Classify an I/O error for `path`.
    pub fn io(path: &Path, err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    }
}

/// Core error type for semantic domain errors.
///
/// This is the canonical error type used across the core domain.
/// Adapters should map this to their own error types (CLI exit codes,
/// front-end soft error messages).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Settings validation error.
    #[error(transparent)]
    Settings(#[from] crate::config::SettingsError),

    /// Config persistence error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Inference backend error.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Generation failed.
    #[error(transparent)]
    Generation(#[from] crate::domain::GenerationError),

    /// Path resolution error.
    #[error(transparent)]
    Path(#[from] crate::paths::PathError),

    /// Validation error (invalid input).
    #[error("Validation error: {0}")]
    Validation(String),

    /// External service error (model download, remote endpoint).
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal error (unexpected condition).
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_is_classified() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            ConfigError::io(Path::new("/tmp/x.json"), &err),
            ConfigError::NotFound(_)
        ));

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        match ConfigError::io(Path::new("/tmp/x.json"), &err) {
            ConfigError::Io { path, reason } => {
                assert_eq!(path, PathBuf::from("/tmp/x.json"));
                assert!(reason.contains("nope"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: CoreError = crate::config::SettingsError::InvalidMaxTokens(0).into();
        assert_eq!(err.to_string(), "Max tokens must be between 1 and 8192, got 0");
    }
}
