//! Generation requests and their outcomes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{
    Config, LlmConfig, MAX_TOKENS_RANGE, TEMPERATURE_RANGE, TOP_K_RANGE, TOP_P_RANGE,
};

/// Stop sequences applied to every chat reply, in match order.
pub const DEFAULT_STOP_SEQUENCES: &[&str] = &[
    "</s>",
    "<|eot_id|>",
    "<|im_end|>",
    "\nUser:",
    "User:",
    "\nAssistant:",
    "Assistant:",
];

/// Sampling and stopping options for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl GenerationOptions {
    /// Options derived from the persisted LLM settings.
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self {
            temperature: llm.temperature,
            top_k: llm.top_k,
            top_p: llm.top_p,
            max_tokens: llm.max_tokens,
            stop_sequences: DEFAULT_STOP_SEQUENCES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Reject options no backend should be asked to honour.
    pub fn validate(&self) -> Result<(), GenerationError> {
        let invalid = |msg: String| Err(GenerationError::new(ErrorKind::InvalidOptions, msg));

        if !self.temperature.is_finite() || !TEMPERATURE_RANGE.contains(&self.temperature) {
            return invalid(format!("temperature {} out of range", self.temperature));
        }
        if !TOP_K_RANGE.contains(&self.top_k) {
            return invalid(format!("top_k {} out of range", self.top_k));
        }
        if !TOP_P_RANGE.contains(&self.top_p) {
            return invalid(format!("top_p {} out of range", self.top_p));
        }
        if !MAX_TOKENS_RANGE.contains(&self.max_tokens) {
            return invalid(format!("max_tokens {} out of range", self.max_tokens));
        }
        if self.stop_sequences.iter().any(String::is_empty) {
            return invalid("empty stop sequence".to_string());
        }
        Ok(())
    }
}

/// One prompt plus everything needed to generate a reply for it.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub options: GenerationOptions,
    /// Wall-clock budget; the request finishes as `TimedOut` when exceeded.
    pub timeout: Duration,
}

impl GenerationRequest {
    /// Build a request using the sampling settings and timeout of `config`.
    pub fn from_config(prompt: impl Into<String>, config: &Config) -> Self {
        Self {
            prompt: prompt.into(),
            options: GenerationOptions::from_config(&config.llm),
            timeout: Duration::from_millis(config.llm.timeout_ms),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Why a generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    /// The backend ended the reply on its own.
    Completed,
    /// A stop sequence matched.
    StopSequence,
    /// The token cap was reached.
    MaxTokens,
    /// Superseded or aborted by the caller.
    Cancelled,
    /// The wall-clock timeout fired.
    TimedOut,
}

impl FinishReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::StopSequence => "stopSequence",
            Self::MaxTokens => "maxTokens",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timedOut",
        }
    }

    /// True if the reply was cut short by the caller or the clock.
    pub const fn is_interrupted(self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a generation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Accumulated reply, trimmed, with any stop sequence removed.
    pub text: String,
    pub finish: FinishReason,
    /// Number of text pieces received from the backend.
    pub tokens: usize,
}

/// Coarse classification of a generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The inference backend failed.
    Backend,
    /// The request options were rejected.
    InvalidOptions,
    /// No model is ready to generate.
    NotReady,
    /// Unexpected internal condition.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Backend => "backend error",
            Self::InvalidOptions => "invalid options",
            Self::NotReady => "not ready",
            Self::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// A failed generation. The session stays usable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GenerationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotReady, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}
