//! A loaded model with its primary chat context.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use paperclip_core::{
    ChatContext, Completion, FinishReason, GenerationError, GenerationOptions, InferenceBackend,
    InferenceError, LoadParams, LoadedModel, SessionState,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ephemeral::EphemeralContext;
use super::generate::run_generation;

/// Scope guard that clears the generating flag on drop.
struct GeneratingGuard<'a> {
    generating: &'a AtomicBool,
}

impl<'a> GeneratingGuard<'a> {
    fn new(generating: &'a AtomicBool) -> Self {
        generating.store(true, Ordering::SeqCst);
        Self { generating }
    }
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.generating.store(false, Ordering::SeqCst);
    }
}

/// A ready model plus the primary conversation held against it.
///
/// The primary context is guarded by a mutex, so at most one generation
/// runs against it at a time. Ephemeral contexts are independent of it.
pub struct InferenceSession {
    model: Arc<dyn LoadedModel>,
    primary: Mutex<Box<dyn ChatContext>>,
    generating: AtomicBool,
    closed: CancellationToken,
}

impl InferenceSession {
    /// Load `path` through `backend` and open the primary context.
    pub async fn load(
        backend: &dyn InferenceBackend,
        path: &Path,
        params: &LoadParams,
        system_prompt: Option<&str>,
    ) -> Result<Self, InferenceError> {
        info!(backend = backend.name(), path = %path.display(), context = params.context_size, "Loading model");
        let model = backend.load_model(path, params).await?;

        let primary = match model.create_context(system_prompt).await {
            Ok(ctx) => ctx,
            Err(e) => {
                model.unload().await;
                return Err(e);
            }
        };

        info!(model = model.model_name(), "Model ready");
        Ok(Self {
            model,
            primary: Mutex::new(primary),
            generating: AtomicBool::new(false),
            closed: CancellationToken::new(),
        })
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn state(&self) -> SessionState {
        if self.closed.is_cancelled() {
            SessionState::Unloaded
        } else if self.generating.load(Ordering::SeqCst) {
            SessionState::Generating
        } else {
            SessionState::Ready
        }
    }

    /// Generate a reply on the primary context.
    ///
    /// Waits for any earlier generation to release the context. If `cancel`
    /// fires first, returns an empty `Cancelled` completion without touching
    /// the context.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: &CancellationToken,
        on_token: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Completion, GenerationError> {
        if self.closed.is_cancelled() {
            return Err(GenerationError::not_ready("model has been unloaded"));
        }

        let mut primary = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Cancelled while waiting for the primary context");
                return Ok(Completion {
                    text: String::new(),
                    finish: FinishReason::Cancelled,
                    tokens: 0,
                });
            }
            guard = self.primary.lock() => guard,
        };

        let _generating = GeneratingGuard::new(&self.generating);
        tokio::select! {
            result = run_generation(&mut **primary, prompt, options, cancel, on_token) => result,
            () = self.closed.cancelled() => {
                Err(GenerationError::not_ready("model was unloaded during generation"))
            }
        }
    }

    /// Open an isolated context with its own history and cancellation.
    pub async fn create_ephemeral_context(
        &self,
        system_prompt: Option<&str>,
    ) -> Result<EphemeralContext, InferenceError> {
        if self.closed.is_cancelled() {
            return Err(InferenceError::Disposed);
        }
        let ctx = self.model.create_context(system_prompt).await?;
        Ok(EphemeralContext::new(ctx, self.closed.child_token()))
    }

    /// Release the model. Idempotent.
    pub async fn unload(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        self.model.unload().await;
        info!(model = self.model_name(), "Model unloaded");
    }
}

impl Drop for InferenceSession {
    fn drop(&mut self) {
        if !self.closed.is_cancelled() {
            warn!(model = self.model_name(), "Session dropped without unload");
            self.closed.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use paperclip_core::ErrorKind;
    use std::time::Duration;
    use tempfile::TempDir;

    fn model_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("tiny.gguf");
        std::fs::write(&path, b"GGUF").unwrap();
        path
    }

    async fn load(backend: &ScriptedBackend, dir: &TempDir) -> InferenceSession {
        InferenceSession::load(backend, &model_file(dir), &LoadParams::default(), Some("be nice"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_and_generate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(["Hi", " there"]);
        let session = load(&backend, &dir).await;

        assert_eq!(session.model_name(), "tiny.gguf");
        assert_eq!(session.state(), SessionState::Ready);

        let mut out = String::new();
        let completion = session
            .generate("hello", &GenerationOptions::default(), &CancellationToken::new(), &mut |t| {
                out.push_str(t);
            })
            .await
            .unwrap();

        assert_eq!(completion.text, "Hi there");
        assert_eq!(out, "Hi there");
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_load_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(["x"])
            .failing_load(InferenceError::LoadFailed("bad magic".into()));

        let err = InferenceSession::load(&backend, &model_file(&dir), &LoadParams::default(), None)
            .await
            .err()
            .unwrap();
        assert!(err.is_load_failure());
    }

    #[tokio::test]
    async fn test_generation_error_keeps_session_usable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(["x"]).failing_generation("boom");
        let session = load(&backend, &dir).await;

        let err = session
            .generate("a", &GenerationOptions::default(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Backend);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(backend.stats().unloads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_generating_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(["a", "b", "c"]).with_delay(Duration::from_millis(50));
        let session = Arc::new(load(&backend, &dir).await);

        let task = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .generate("go", &GenerationOptions::default(), &CancellationToken::new(), &mut |_| {})
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(session.state(), SessionState::Generating);

        task.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_unload_is_idempotent_and_blocks_generation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(["a"]);
        let session = load(&backend, &dir).await;

        session.unload().await;
        session.unload().await;
        assert_eq!(backend.stats().unloads(), 1);
        assert_eq!(session.state(), SessionState::Unloaded);

        let err = session
            .generate("a", &GenerationOptions::default(), &CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotReady);
        assert!(session.create_ephemeral_context(None).await.is_err());
    }
}
