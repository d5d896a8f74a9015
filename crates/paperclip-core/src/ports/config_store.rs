//! Config store trait definition.
//!
//! This port defines the interface for persisting the assistant configuration.
//! Implementations handle all storage details internally.

use async_trait::async_trait;
use tracing::warn;

use super::ConfigError;
use crate::config::Config;

/// Store for the persisted [`Config`].
///
/// # Design Rules
///
/// - `load` never fails: unreadable or corrupt storage yields defaults
/// - `save` stores exactly what it is given; merging is the caller's job
/// - Callers load before every operation that needs settings (no caching)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the configuration, falling back to defaults on any failure.
    async fn load(&self) -> Config;

    /// Persist the configuration, reporting failures.
    async fn try_save(&self, config: &Config) -> Result<(), ConfigError>;

    /// Persist the configuration on a best-effort basis.
    async fn save(&self, config: &Config) {
        if let Err(e) = self.try_save(config).await {
            warn!(error = %e, "Failed to save config");
        }
    }
}
