//! Assistant configuration types and validation.
//!
//! This module contains the persisted configuration shape used across the
//! application. Loading is lenient: every field resolves independently, so a
//! malformed or missing field falls back to its hard-coded default while the
//! rest of the document is honoured. Patches applied through
//! [`ConfigUpdate`] are validated strictly instead.

mod lenient;
mod store;

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

pub use store::{JsonConfigStore, MemoryConfigStore};

/// Default context window requested when loading a model.
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default cap on generated tokens per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// Default top-K sampling limit.
pub const DEFAULT_TOP_K: u32 = 40;

/// Default nucleus sampling threshold.
pub const DEFAULT_TOP_P: f32 = 0.95;

/// Default wall-clock budget for one generation, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 45_000;

pub(crate) const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
pub(crate) const MAX_TOKENS_RANGE: RangeInclusive<u32> = 1..=8192;
pub(crate) const CONTEXT_SIZE_RANGE: RangeInclusive<u32> = 512..=1_000_000;
pub(crate) const TOP_K_RANGE: RangeInclusive<u32> = 1..=1000;
pub(crate) const TOP_P_RANGE: RangeInclusive<f32> = f32::MIN_POSITIVE..=1.0;
pub(crate) const TIMEOUT_MS_RANGE: RangeInclusive<u64> = 1_000..=600_000;

/// Full persisted configuration.
///
/// `Deserialize` never fails on a JSON document: see [`Config::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub llm: LlmConfig,
    pub ui: UiConfig,
    pub privacy: PrivacyConfig,
}

/// Language model settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Preferred model file name inside the models directory.
    pub default_model: Option<String>,
    pub context_size: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    /// Hard timeout for a single generation.
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            context_size: DEFAULT_CONTEXT_SIZE,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Presentation preferences. Persisted for the front end; the core only
/// stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    pub theme: Theme,
    pub animations: bool,
    pub chat_bubbles: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Classic,
            animations: true,
            chat_bubbles: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Classic,
    Modern,
}

impl Theme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Modern => "modern",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "modern" => Ok(Self::Modern),
            other => Err(SettingsError::UnknownTheme(other.to_string())),
        }
    }
}

/// Privacy flags. All off by default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyConfig {
    pub store_conversations: bool,
    pub analytics: bool,
    pub telemetry: bool,
}

impl Config {
    /// Build a configuration from an arbitrary JSON value.
    ///
    /// Sections or fields that are missing, of the wrong type or out of range
    /// resolve to their defaults. A non-object document yields the full
    /// default configuration.
    pub fn from_value(value: &serde_json::Value) -> Self {
        lenient::config_from_value(value)
    }

    /// Parse a JSON document leniently. Only fails if the text is not JSON.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    /// The configured default model, ignoring blank names.
    pub fn preferred_model(&self) -> Option<&str> {
        self.llm
            .default_model
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Merge a patch into this configuration, only updating fields that are set.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(ref model) = update.default_model {
            self.llm.default_model.clone_from(model);
        }
        if let Some(ctx) = update.context_size {
            self.llm.context_size = ctx;
        }
        if let Some(temperature) = update.temperature {
            self.llm.temperature = temperature;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.llm.max_tokens = max_tokens;
        }
        if let Some(top_k) = update.top_k {
            self.llm.top_k = top_k;
        }
        if let Some(top_p) = update.top_p {
            self.llm.top_p = top_p;
        }
        if let Some(timeout) = update.timeout_ms {
            self.llm.timeout_ms = timeout;
        }
        if let Some(theme) = update.theme {
            self.ui.theme = theme;
        }
        if let Some(animations) = update.animations {
            self.ui.animations = animations;
        }
        if let Some(bubbles) = update.chat_bubbles {
            self.ui.chat_bubbles = bubbles;
        }
        if let Some(store) = update.store_conversations {
            self.privacy.store_conversations = store;
        }
        if let Some(analytics) = update.analytics {
            self.privacy.analytics = analytics;
        }
        if let Some(telemetry) = update.telemetry {
            self.privacy.telemetry = telemetry;
        }
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Partial configuration update.
///
/// `default_model` is `Option<Option<String>>`:
/// - `None` = don't change the preference
/// - `Some(None)` = clear it (fall back to the first available model)
/// - `Some(Some(name))` = prefer `name`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    pub default_model: Option<Option<String>>,
    pub context_size: Option<u32>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub timeout_ms: Option<u64>,
    pub theme: Option<Theme>,
    pub animations: Option<bool>,
    pub chat_bubbles: Option<bool>,
    pub store_conversations: Option<bool>,
    pub analytics: Option<bool>,
    pub telemetry: Option<bool>,
}

impl ConfigUpdate {
    /// True if nothing would change.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True if applying this patch to `current` selects a different model.
    pub fn changes_model(&self, current: &Config) -> bool {
        self.default_model
            .as_ref()
            .is_some_and(|model| model.as_deref() != current.llm.default_model.as_deref())
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),

    #[error("Max tokens must be between 1 and 8192, got {0}")]
    InvalidMaxTokens(u32),

    #[error("Context size must be between 512 and 1,000,000, got {0}")]
    InvalidContextSize(u32),

    #[error("Top-K must be between 1 and 1000, got {0}")]
    InvalidTopK(u32),

    #[error("Top-P must be in (0, 1], got {0}")]
    InvalidTopP(f32),

    #[error("Timeout must be between 1s and 600s, got {0}ms")]
    InvalidTimeout(u64),

    #[error("Model name cannot be empty")]
    EmptyModelName,

    #[error("Unknown theme '{0}' (expected classic or modern)")]
    UnknownTheme(String),
}

/// Validate configuration values.
pub fn validate_config(config: &Config) -> Result<(), SettingsError> {
    let llm = &config.llm;

    if !TEMPERATURE_RANGE.contains(&llm.temperature) {
        return Err(SettingsError::InvalidTemperature(llm.temperature));
    }
    if !MAX_TOKENS_RANGE.contains(&llm.max_tokens) {
        return Err(SettingsError::InvalidMaxTokens(llm.max_tokens));
    }
    if !CONTEXT_SIZE_RANGE.contains(&llm.context_size) {
        return Err(SettingsError::InvalidContextSize(llm.context_size));
    }
    if !TOP_K_RANGE.contains(&llm.top_k) {
        return Err(SettingsError::InvalidTopK(llm.top_k));
    }
    if !TOP_P_RANGE.contains(&llm.top_p) {
        return Err(SettingsError::InvalidTopP(llm.top_p));
    }
    if !TIMEOUT_MS_RANGE.contains(&llm.timeout_ms) {
        return Err(SettingsError::InvalidTimeout(llm.timeout_ms));
    }
    if llm
        .default_model
        .as_ref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(SettingsError::EmptyModelName);
    }

    Ok(())
}
