//! Inference backend port.
//!
//! A backend loads a model file and hands out chat contexts. Every context
//! owns its own system prompt and history; contexts created from the same
//! model never share generation state.
//!
//! ```text
//! InferenceBackend ──load_model──▶ LoadedModel ──create_context──▶ ChatContext
//! ```

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{ErrorKind, GenerationError, GenerationOptions};

/// Callback receiving each decoded text piece.
///
/// Returning `ControlFlow::Break` asks the backend to stop producing.
pub type TokenSink<'a> = dyn FnMut(&str) -> ControlFlow<()> + Send + 'a;

/// Parameters applied when a model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadParams {
    /// Context window size in tokens.
    pub context_size: u32,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            context_size: crate::config::DEFAULT_CONTEXT_SIZE,
        }
    }
}

/// Errors raised by an inference backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// No usable inference engine on this machine.
    #[error("Inference backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The model file does not exist.
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// The engine rejected the model.
    #[error("Failed to load model: {0}")]
    LoadFailed(String),

    /// A generation context could not be created.
    #[error("Failed to create context: {0}")]
    ContextFailed(String),

    /// Generation failed mid-stream.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Options rejected by the engine.
    #[error("Invalid generation options: {0}")]
    InvalidOptions(String),

    /// The model or context was already released.
    #[error("Model has been unloaded")]
    Disposed,
}

impl InferenceError {
    /// True for errors that mean the model can never serve requests.
    pub const fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::ModelNotFound(_) | Self::LoadFailed(_)
        )
    }
}

impl From<InferenceError> for GenerationError {
    fn from(err: InferenceError) -> Self {
        let kind = match &err {
            InferenceError::InvalidOptions(_) => ErrorKind::InvalidOptions,
            InferenceError::Disposed | InferenceError::BackendUnavailable(_) => ErrorKind::NotReady,
            _ => ErrorKind::Backend,
        };
        Self::new(kind, err.to_string())
    }
}

/// An inference engine able to load model files.
///
/// Implementations are chosen once at startup by capability detection.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short identifier for logs and status output.
    fn name(&self) -> &'static str;

    /// Load the model at `path`.
    async fn load_model(
        &self,
        path: &Path,
        params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, InferenceError>;
}

/// A model loaded by a backend. Shared read-only between contexts.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    /// File name of the loaded model.
    fn model_name(&self) -> &str;

    /// Create an isolated chat context.
    async fn create_context(
        &self,
        system_prompt: Option<&str>,
    ) -> Result<Box<dyn ChatContext>, InferenceError>;

    /// Release the model. Contexts created from it fail with
    /// [`InferenceError::Disposed`] afterwards.
    async fn unload(&self);
}

/// A stateful chat context.
#[async_trait]
pub trait ChatContext: Send {
    /// Stream a reply to `prompt`, pushing text pieces into `on_token`.
    ///
    /// Returns when the engine finishes, when `on_token` breaks, or when
    /// `cancel` fires. Cancellation is observed between pieces, so one more
    /// piece may be delivered after the token is cancelled.
    async fn generate(
        &mut self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: &CancellationToken,
        on_token: &mut TokenSink<'_>,
    ) -> Result<(), InferenceError>;

    /// Record a finished exchange in this context's history.
    fn commit_turn(&mut self, prompt: &str, reply: &str);
}
