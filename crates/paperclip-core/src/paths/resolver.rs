//! All resolved paths in one struct, for `paperclip paths` and tests.

use std::path::PathBuf;

use super::{
    ModelsDirSource, PathError, config_path, data_root, llama_server_path, resolve_models_dir,
};

/// All resolved paths captured in a single struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub data_root: PathBuf,
    pub config_path: PathBuf,
    /// Managed llama-server location (may not exist).
    pub llama_server_path: PathBuf,
    pub models_dir: PathBuf,
    pub models_source: ModelsDirSource,
}

impl ResolvedPaths {
    /// Resolve all paths, honouring an explicit models directory override.
    pub fn resolve(models_dir: Option<&str>) -> Result<Self, PathError> {
        let models = resolve_models_dir(models_dir)?;

        Ok(Self {
            data_root: data_root()?,
            config_path: config_path()?,
            llama_server_path: llama_server_path()?,
            models_dir: models.path,
            models_source: models.source,
        })
    }
}

impl std::fmt::Display for ResolvedPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "data_root = {}", self.data_root.display())?;
        writeln!(f, "config_path = {}", self.config_path.display())?;
        writeln!(
            f,
            "llama_server_path = {}",
            self.llama_server_path.display()
        )?;
        writeln!(f, "models_dir = {}", self.models_dir.display())?;
        write!(f, "models_source = {}", self.models_source.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DATA_DIR_ENV;
    use crate::paths::test_utils::{ENV_LOCK, EnvVarGuard};

    #[test]
    fn resolve_returns_consistent_paths() {
        let _guard = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvVarGuard::set(DATA_DIR_ENV, temp.path().to_string_lossy().as_ref());

        let first = ResolvedPaths::resolve(None).expect("first resolve");
        let second = ResolvedPaths::resolve(None).expect("second resolve");
        assert_eq!(first, second);
        assert!(first.config_path.starts_with(&first.data_root));
    }

    #[test]
    fn display_format_is_parseable() {
        let _guard = ENV_LOCK.lock().unwrap();
        let paths = ResolvedPaths::resolve(Some("/tmp/models")).expect("resolve");
        let output = paths.to_string();

        assert!(output.contains("data_root = "));
        assert!(output.contains("config_path = "));
        assert!(output.contains("models_dir = /tmp/models"));
        assert!(output.contains("models_source = explicit"));
    }
}
