//! CLI-specific error types and mappings.
//!
//! Maps [`CoreError`] and generation failures to exit codes and
//! user-facing messages.

use paperclip_core::{CoreError, ErrorKind, GenerationError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core domain error.
    #[error("{0}")]
    Core(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generation or backend failure.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Remote service error (model download, inference endpoint).
    #[error("Service error: {0}")]
    Service(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits:
    /// - 1: General error
    /// - 64: Invalid arguments (`EX_USAGE`)
    /// - 69: Service unavailable (`EX_UNAVAILABLE`)
    /// - 70: Internal software error (`EX_SOFTWARE`)
    /// - 74: IO error (`EX_IOERR`)
    /// - 78: Configuration error (`EX_CONFIG`)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 64,
            Self::Service(_) => 69,
            Self::Generation(_) => 70,
            Self::Io(_) => 74,
            Self::Config(_) => 78,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Settings(e) => Self::Arguments(e.to_string()),
            CoreError::Validation(msg) => Self::Arguments(msg),
            CoreError::Config(e) => Self::Config(e.to_string()),
            CoreError::Path(e) => Self::Io(e.to_string()),
            CoreError::Inference(e) => Self::Service(e.to_string()),
            CoreError::Generation(e) => e.into(),
            CoreError::ExternalService(msg) => Self::Service(msg),
            CoreError::Internal(msg) => Self::Core(msg),
        }
    }
}

impl From<GenerationError> for CliError {
    fn from(err: GenerationError) -> Self {
        match err.kind {
            ErrorKind::InvalidOptions => Self::Arguments(err.message),
            ErrorKind::Backend | ErrorKind::NotReady | ErrorKind::Internal => {
                Self::Generation(err.to_string())
            }
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Exit code for an error returned from a command handler.
///
/// Walks the `anyhow` chain for a [`CliError`] and falls back to 1.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CliError>())
        .map_or(1, CliError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperclip_core::SettingsError;

    #[test]
    fn test_settings_errors_are_usage_errors() {
        let err: CliError = CoreError::Settings(SettingsError::InvalidMaxTokens(0)).into();
        assert_eq!(err.exit_code(), 64);
    }

    #[test]
    fn test_generation_kinds_map() {
        let invalid: CliError = GenerationError::new(ErrorKind::InvalidOptions, "empty").into();
        assert!(matches!(invalid, CliError::Arguments(ref m) if m == "empty"));

        let backend: CliError = GenerationError::new(ErrorKind::Backend, "socket closed").into();
        assert_eq!(backend.exit_code(), 70);
    }

    #[test]
    fn test_exit_code_found_through_context() {
        let err = anyhow::Error::new(CliError::Config("bad".into())).context("while saving");
        assert_eq!(exit_code_for(&err), 78);
        assert_eq!(exit_code_for(&anyhow::anyhow!("plain")), 1);
    }
}
