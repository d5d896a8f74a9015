//! Models directory resolution.
//!
//! Provides utilities for resolving the models directory from explicit paths,
//! environment variables, or the data root.

use std::env;
use std::path::PathBuf;

use super::MODELS_DIR_ENV;
use super::error::PathError;
use super::platform::{data_root, normalize_user_path};

/// How the models directory was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelsDirSource {
    /// The user passed an explicit path (CLI flag).
    Explicit,
    /// The path came from `PAPERCLIP_MODELS_DIR` / `.env`.
    EnvVar,
    /// Fallback default (`<data root>/models`).
    Default,
}

impl ModelsDirSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::EnvVar => "env",
            Self::Default => "default",
        }
    }
}

/// Resolution result for the models directory.
#[derive(Debug, Clone)]
pub struct ModelsDirResolution {
    pub path: PathBuf,
    pub source: ModelsDirSource,
}

/// Default models directory: `<data root>/models`.
pub fn default_models_dir() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("models"))
}

/// Resolve the models directory.
///
/// Resolution order:
/// 1. Explicit path provided by caller (highest priority)
/// 2. `PAPERCLIP_MODELS_DIR` environment variable
/// 3. Default models directory
pub fn resolve_models_dir(explicit: Option<&str>) -> Result<ModelsDirResolution, PathError> {
    if let Some(path_str) = explicit {
        return Ok(ModelsDirResolution {
            path: normalize_user_path(path_str)?,
            source: ModelsDirSource::Explicit,
        });
    }

    if let Ok(env_path) = env::var(MODELS_DIR_ENV) {
        if !env_path.trim().is_empty() {
            return Ok(ModelsDirResolution {
                path: normalize_user_path(&env_path)?,
                source: ModelsDirSource::EnvVar,
            });
        }
    }

    Ok(ModelsDirResolution {
        path: default_models_dir()?,
        source: ModelsDirSource::Default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DATA_DIR_ENV;
    use crate::paths::test_utils::{ENV_LOCK, EnvVarGuard};

    #[test]
    fn test_resolve_models_dir_prefers_explicit() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(MODELS_DIR_ENV, "/tmp/env-value");

        let resolved = resolve_models_dir(Some("/tmp/explicit")).unwrap();
        assert_eq!(resolved.source, ModelsDirSource::Explicit);
        assert!(resolved.path.ends_with("explicit"));
    }

    #[test]
    fn test_resolve_models_dir_env_value() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(MODELS_DIR_ENV, "/tmp/from-env");

        let resolved = resolve_models_dir(None).unwrap();
        assert_eq!(resolved.source, ModelsDirSource::EnvVar);
        assert!(resolved.path.ends_with("from-env"));
    }

    #[test]
    fn test_resolve_models_dir_default_under_data_root() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let _data = EnvVarGuard::set(DATA_DIR_ENV, temp.path().to_string_lossy().as_ref());
        let _models = EnvVarGuard::set(MODELS_DIR_ENV, "  ");

        let resolved = resolve_models_dir(None).unwrap();
        assert_eq!(resolved.source, ModelsDirSource::Default);
        assert_eq!(resolved.path, temp.path().join("models"));
    }
}
