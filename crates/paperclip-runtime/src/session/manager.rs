//! Ownership of the primary inference session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use paperclip_core::{
    ConfigStore, InferenceBackend, LoadParams, SessionState, SessionStatus, list_model_names,
    resolve,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::inference::InferenceSession;

enum Slot {
    Unloaded,
    Loading { model: String },
    Ready(Arc<InferenceSession>),
    Demo { model: Option<String>, detail: String },
}

impl Slot {
    fn status(&self) -> SessionStatus {
        match self {
            Self::Unloaded => SessionStatus::unloaded(),
            Self::Loading { model } => SessionStatus {
                model_detected: true,
                model_name: Some(model.clone()),
                state: SessionState::Loading,
                ..SessionStatus::unloaded()
            },
            Self::Ready(session) => {
                let mut status = SessionStatus::ready(session.model_name());
                status.state = session.state();
                status
            }
            Self::Demo { model, detail } => SessionStatus::demo(model.clone(), detail.clone()),
        }
    }
}

/// Owns the primary session and swaps it when the model changes.
///
/// Loading never fails from the caller's point of view: a missing backend,
/// an empty models directory or a model that will not load all end in demo
/// mode, with the cause kept in [`SessionStatus::detail`].
pub struct SessionManager {
    backend: Arc<dyn InferenceBackend>,
    config: Arc<dyn ConfigStore>,
    models_dir: PathBuf,
    system_prompt: String,
    slot: RwLock<Slot>,
    reload_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        config: Arc<dyn ConfigStore>,
        models_dir: impl Into<PathBuf>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            config,
            models_dir: models_dir.into(),
            system_prompt: system_prompt.into(),
            slot: RwLock::new(Slot::Unloaded),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Model files currently in the models directory.
    pub fn list_models(&self) -> Vec<String> {
        list_model_names(&self.models_dir)
    }

    /// Load the preferred model for the first time.
    pub async fn initialize(&self) -> SessionStatus {
        self.reload().await
    }

    /// Resolve the preferred model again and (re)load it.
    ///
    /// The previous session is unloaded first. When the stored preference is
    /// missing or names a file that no longer exists, the model actually
    /// selected is written back to the config.
    pub async fn reload(&self) -> SessionStatus {
        let _reloading = self.reload_lock.lock().await;

        let mut config = self.config.load().await;
        let available = self.list_models();
        let Some(model) = resolve(config.preferred_model(), &available).map(str::to_string) else {
            self.release().await;
            let detail = format!("no model files in {}", self.models_dir.display());
            info!(models_dir = %self.models_dir.display(), "No models found, serving demo replies");
            return self
                .install(Slot::Demo {
                    model: None,
                    detail,
                })
                .await;
        };

        if config.preferred_model() != Some(model.as_str()) {
            info!(
                preferred = ?config.preferred_model(),
                selected = %model,
                "Persisting auto-selected model"
            );
            config.llm.default_model = Some(model.clone());
            self.config.save(&config).await;
        }

        self.release().await;
        self.install(Slot::Loading {
            model: model.clone(),
        })
        .await;

        let params = LoadParams {
            context_size: config.llm.context_size,
        };
        let path = self.models_dir.join(&model);
        let slot = match InferenceSession::load(
            self.backend.as_ref(),
            &path,
            &params,
            Some(&self.system_prompt),
        )
        .await
        {
            Ok(session) => Slot::Ready(Arc::new(session)),
            Err(e) => {
                let backend = self.backend.name();
                if e.is_load_failure() {
                    warn!(
                        model = %model,
                        backend,
                        error = %e,
                        "Model load failed, serving demo replies"
                    );
                } else {
                    warn!(
                        model = %model,
                        backend,
                        error = %e,
                        "Model unusable, serving demo replies"
                    );
                }
                Slot::Demo {
                    model: Some(model),
                    detail: e.to_string(),
                }
            }
        };
        self.install(slot).await
    }

    pub async fn status(&self) -> SessionStatus {
        self.slot.read().await.status()
    }

    /// The ready session, if any.
    pub async fn current(&self) -> Option<Arc<InferenceSession>> {
        match &*self.slot.read().await {
            Slot::Ready(session) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Unload the current model, leaving the manager unloaded.
    pub async fn shutdown(&self) {
        let _reloading = self.reload_lock.lock().await;
        self.release().await;
        debug!("Session manager shut down");
    }

    async fn install(&self, slot: Slot) -> SessionStatus {
        let mut guard = self.slot.write().await;
        *guard = slot;
        guard.status()
    }

    async fn release(&self) {
        let previous = std::mem::replace(&mut *self.slot.write().await, Slot::Unloaded);
        if let Slot::Ready(session) = previous {
            session.unload().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::UnavailableBackend;
    use crate::testing::ScriptedBackend;
    use paperclip_core::{Config, InferenceError, MemoryConfigStore};
    use tempfile::TempDir;

    fn models(names: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"GGUF").unwrap();
        }
        dir
    }

    fn manager(
        backend: Arc<dyn InferenceBackend>,
        store: &Arc<MemoryConfigStore>,
        dir: &TempDir,
    ) -> SessionManager {
        let config: Arc<dyn ConfigStore> = store.clone();
        SessionManager::new(backend, config, dir.path(), "You are Paperclip.")
    }

    #[tokio::test]
    async fn test_unmatched_preference_falls_back_and_persists() {
        let dir = models(&["a.gguf"]);
        let mut config = Config::default();
        config.llm.default_model = Some("c.gguf".into());
        let store = Arc::new(MemoryConfigStore::new(config));
        let manager = manager(Arc::new(ScriptedBackend::new(["hi"])), &store, &dir);

        let status = manager.initialize().await;
        assert!(status.ready);
        assert_eq!(status.model_name.as_deref(), Some("a.gguf"));
        assert_eq!(store.snapshot().llm.default_model.as_deref(), Some("a.gguf"));
    }

    #[tokio::test]
    async fn test_matching_preference_is_loaded() {
        let dir = models(&["a.gguf", "b.gguf"]);
        let mut config = Config::default();
        config.llm.default_model = Some("b.gguf".into());
        let store = Arc::new(MemoryConfigStore::new(config));
        let manager = manager(Arc::new(ScriptedBackend::new(["hi"])), &store, &dir);

        let status = manager.initialize().await;
        assert_eq!(status.model_name.as_deref(), Some("b.gguf"));
        assert!(manager.current().await.is_some());
    }

    #[tokio::test]
    async fn test_no_models_is_demo_without_detection() {
        let dir = models(&[]);
        let store = Arc::new(MemoryConfigStore::default());
        let manager = manager(Arc::new(ScriptedBackend::new(["hi"])), &store, &dir);

        let status = manager.initialize().await;
        assert!(status.demo_mode);
        assert!(!status.model_detected);
        assert!(status.detail.unwrap().contains("no model files"));
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn test_load_failure_is_demo_with_detection() {
        let dir = models(&["a.gguf"]);
        let store = Arc::new(MemoryConfigStore::default());
        let backend =
            ScriptedBackend::new(["hi"]).failing_load(InferenceError::LoadFailed("corrupt".into()));
        let manager = manager(Arc::new(backend), &store, &dir);

        let status = manager.initialize().await;
        assert_eq!(status.state, SessionState::DemoFallback);
        assert!(status.model_detected);
        assert_eq!(status.model_name.as_deref(), Some("a.gguf"));
        assert!(status.detail.unwrap().contains("corrupt"));
    }

    #[tokio::test]
    async fn test_missing_backend_collapses_to_demo() {
        let dir = models(&["a.gguf"]);
        let store = Arc::new(MemoryConfigStore::default());
        let manager = manager(Arc::new(UnavailableBackend::new("no llama-server")), &store, &dir);

        let status = manager.initialize().await;
        assert!(status.demo_mode);
        assert!(status.model_detected);
        assert!(status.detail.unwrap().contains("no llama-server"));
    }

    #[tokio::test]
    async fn test_reload_swaps_and_unloads_previous() {
        let dir = models(&["a.gguf", "b.gguf"]);
        let mut config = Config::default();
        config.llm.default_model = Some("a.gguf".into());
        let store = Arc::new(MemoryConfigStore::new(config));
        let backend = ScriptedBackend::new(["hi"]);
        let stats = backend.stats();
        let manager = manager(Arc::new(backend), &store, &dir);

        manager.initialize().await;
        let first = manager.current().await.unwrap();

        let mut config = store.snapshot();
        config.llm.default_model = Some("b.gguf".into());
        store.save(&config).await;

        let status = manager.reload().await;
        assert_eq!(status.model_name.as_deref(), Some("b.gguf"));
        assert_eq!(first.state(), SessionState::Unloaded);
        assert_eq!(stats.loads(), 2);
        assert_eq!(stats.unloads(), 1);

        manager.shutdown().await;
        assert_eq!(stats.unloads(), 2);
        assert_eq!(manager.status().await.state, SessionState::Unloaded);
    }
}
