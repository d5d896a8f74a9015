//! Config store implementations: a JSON file and an in-memory store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::Config;
use crate::ports::{ConfigError, ConfigStore};

/// Config store backed by a JSON file on disk.
///
/// Nothing is cached: every `load` reads the file again, so it is safe to
/// call as often as needed and always observes the latest `save`.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Config, ConfigError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::io(&self.path, &e))?;
        Config::from_json_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Config {
        match self.read().await {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => {
                debug!(path = %self.path.display(), "No config file, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable config, using defaults");
                Config::default()
            }
        }
    }

    async fn try_save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::io(parent, &e))?;
        }

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        // Write next to the target and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| ConfigError::io(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ConfigError::io(&self.path, &e))?;

        debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }
}

/// In-memory config store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<Config>,
}

impl MemoryConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    /// Snapshot of the stored value.
    pub fn snapshot(&self) -> Config {
        self.config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Config {
        self.snapshot()
    }

    async fn try_save(&self, config: &Config) -> Result<(), ConfigError> {
        let mut guard = self
            .config
            .lock()
            .map_err(|_| ConfigError::Serialize("config lock poisoned".to_string()))?;
        *guard = config.clone();
        Ok(())
    }
}
