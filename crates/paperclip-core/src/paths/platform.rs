//! Platform-specific path resolution.

use std::env;
use std::fs;
use std::path::PathBuf;

use super::DATA_DIR_ENV;
use super::error::PathError;

const APP_DIR_NAME: &str = "paperclip";

/// Get the root directory for application data (config, models, binaries).
///
/// Resolution order:
/// 1. `PAPERCLIP_DATA_DIR` environment variable
/// 2. System data directory (e.g., `~/.local/share/paperclip`)
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return normalize_user_path(&path);
        }
    }

    let root = dirs::data_local_dir()
        .ok_or(PathError::NoDataDir)?
        .join(APP_DIR_NAME);

    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| PathError::CreateFailed {
            path: root.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(root)
}

/// Normalize a user-provided path, expanding `~` and making it absolute.
pub(super) fn normalize_user_path(raw: &str) -> Result<PathBuf, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::EmptyPath);
    }

    let expanded = if trimmed == "~" {
        dirs::home_dir().ok_or(PathError::NoHomeDir)?
    } else if let Some(rest) = trimmed.strip_prefix("~/") {
        dirs::home_dir().ok_or(PathError::NoHomeDir)?.join(rest)
    } else {
        PathBuf::from(trimmed)
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|e| PathError::CurrentDirError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::test_utils::{ENV_LOCK, EnvVarGuard};

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(normalize_user_path("   "), Err(PathError::EmptyPath)));
    }

    #[test]
    fn test_normalize_makes_absolute() {
        let path = normalize_user_path("models").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_data_root_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvVarGuard::set(DATA_DIR_ENV, temp.path().to_string_lossy().as_ref());

        assert_eq!(data_root().unwrap(), temp.path());
    }
}
