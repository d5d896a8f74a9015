//! The assistant service: the single facade front ends talk to.

use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use paperclip_core::{
    AssistantEvent, Completion, Config, ConfigStore, ConfigUpdate, CoreError, ErrorKind,
    FinishReason, GenerationError, GenerationRequest, InferenceBackend, RequestId, SessionState,
    SessionStatus, validate_config,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::coordinator::{GenerationCoordinator, RequestTicket};
use crate::demo::{DEMO_CHUNK_DELAY, demo_reply, demo_stream};
use crate::events::EventBroadcaster;
use crate::facts::{Fact, FactPrefetchQueue, FactSource, SessionFactSource};
use crate::session::SessionManager;

/// Persona of the primary conversation.
pub const SYSTEM_PROMPT: &str = "You are Paperclip, the friendly office assistant from the 1990s. \
Be concise, helpful, and cheerful. A tiny touch of nostalgia is welcome.";

/// Outcome of one chat submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub request_id: RequestId,
    pub text: String,
    pub finish: FinishReason,
    /// Synthetic reply served without a model.
    pub demo: bool,
}

/// Chat, settings and fun facts on top of one primary session.
///
/// Partial tokens are pushed to [`subscribe`](Self::subscribe) receivers as
/// [`AssistantEvent`]s; the final text is also returned to the caller.
pub struct AssistantService {
    sessions: Arc<SessionManager>,
    config: Arc<dyn ConfigStore>,
    coordinator: GenerationCoordinator,
    facts: Arc<FactPrefetchQueue>,
    events: EventBroadcaster,
    demo_delay: Duration,
}

impl AssistantService {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        config: Arc<dyn ConfigStore>,
        models_dir: impl Into<PathBuf>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            backend,
            Arc::clone(&config),
            models_dir,
            SYSTEM_PROMPT,
        ));
        let source: Arc<dyn FactSource> = Arc::new(SessionFactSource::new(Arc::clone(&sessions)));
        Self {
            facts: Arc::new(FactPrefetchQueue::new(source)),
            sessions,
            config,
            coordinator: GenerationCoordinator::new(),
            events: EventBroadcaster::new(),
            demo_delay: DEMO_CHUNK_DELAY,
        }
    }

    /// Replace the fact queue's source.
    #[must_use]
    pub fn with_fact_source(mut self, source: Arc<dyn FactSource>) -> Self {
        self.facts = Arc::new(FactPrefetchQueue::new(source));
        self
    }

    #[must_use]
    pub const fn with_demo_delay(mut self, delay: Duration) -> Self {
        self.demo_delay = delay;
        self
    }

    pub const fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Load the preferred model and start prefetching facts.
    pub async fn initialize(&self) -> SessionStatus {
        let status = self.sessions.initialize().await;
        info!(
            ready = status.ready,
            demo = status.demo_mode,
            model = ?status.model_name,
            backend = self.sessions.backend_name(),
            "Assistant initialized"
        );
        if status.ready {
            self.facts.spawn_refill();
        }
        self.events.broadcast(AssistantEvent::StatusChanged {
            status: status.clone(),
        });
        status
    }

    /// Answer `text`, superseding any request still in flight.
    pub async fn submit_message(&self, text: &str) -> Result<Reply, GenerationError> {
        self.submit_message_with(text, &mut |_| {}).await
    }

    /// Like [`submit_message`](Self::submit_message), also handing each
    /// token to `on_token`.
    #[instrument(skip(self, text, on_token), fields(len = text.len()))]
    pub async fn submit_message_with(
        &self,
        text: &str,
        on_token: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Reply, GenerationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::new(
                ErrorKind::InvalidOptions,
                "message is empty",
            ));
        }

        let ticket = self.coordinator.begin();
        let request_id = ticket.id();
        let events = self.events.clone();
        let mut sink = |piece: &str| {
            events.broadcast(AssistantEvent::Token {
                request_id,
                text: piece.to_string(),
            });
            on_token(piece);
        };

        let result = match self.sessions.current().await {
            Some(session) => {
                let config = self.config.load().await;
                let request = GenerationRequest::from_config(text, &config);
                ticket
                    .run(&session, &request, &mut sink)
                    .await
                    .map(|completion| (completion, false))
            }
            None => {
                let status = self.sessions.status().await;
                if status.state == SessionState::Loading {
                    Err(GenerationError::new(
                        ErrorKind::NotReady,
                        "the model is still loading, try again in a moment",
                    ))
                } else {
                    let completion = self
                        .run_demo(&ticket, text, status.model_detected, &mut sink)
                        .await;
                    Ok((completion, true))
                }
            }
        };

        match result {
            Ok((completion, demo)) => {
                debug!(request_id, finish = %completion.finish, tokens = completion.tokens, demo, "Reply finished");
                self.events.broadcast(AssistantEvent::Completed {
                    request_id,
                    text: completion.text.clone(),
                    finish: completion.finish,
                });
                Ok(Reply {
                    request_id,
                    text: completion.text,
                    finish: completion.finish,
                    demo,
                })
            }
            Err(e) => {
                self.events.broadcast(AssistantEvent::Failed {
                    request_id,
                    kind: e.kind,
                    message: e.message.clone(),
                });
                Err(e)
            }
        }
    }

    async fn run_demo(
        &self,
        ticket: &RequestTicket,
        text: &str,
        model_detected: bool,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Completion {
        let reply = demo_reply(text, model_detected);
        let mut chunks = pin!(demo_stream(&reply, self.demo_delay));
        let mut delivered = String::new();
        let mut tokens = 0;

        let finish = loop {
            tokio::select! {
                biased;
                () = ticket.token().cancelled() => break FinishReason::Cancelled,
                next = chunks.next() => match next {
                    Some(chunk) => {
                        sink(&chunk);
                        delivered.push_str(&chunk);
                        tokens += 1;
                    }
                    None => break FinishReason::Completed,
                },
            }
        };

        Completion {
            text: delivered.trim().to_string(),
            finish,
            tokens,
        }
    }

    /// Abort the reply in flight, if any.
    pub fn cancel(&self) -> Option<RequestId> {
        self.coordinator.cancel_current()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> SessionStatus {
        self.sessions.status().await
    }

    pub fn list_models(&self) -> Vec<String> {
        self.sessions.list_models()
    }

    pub async fn settings(&self) -> Config {
        self.config.load().await
    }

    /// Validate, persist and apply a settings patch.
    ///
    /// Reloads the session when the model or context size changes.
    pub async fn apply_settings(&self, patch: &ConfigUpdate) -> Result<Config, CoreError> {
        let current = self.config.load().await;
        let mut next = current.clone();
        next.apply(patch);
        self.store_settings(&current, next).await
    }

    /// Restore every setting to its default.
    pub async fn reset_settings(&self) -> Result<Config, CoreError> {
        let current = self.config.load().await;
        self.store_settings(&current, Config::default()).await
    }

    async fn store_settings(&self, current: &Config, next: Config) -> Result<Config, CoreError> {
        validate_config(&next)?;
        if let Some(model) = next.preferred_model() {
            let changed = current.preferred_model() != Some(model);
            if changed && !self.list_models().iter().any(|m| m == model) {
                return Err(CoreError::Validation(format!(
                    "model '{model}' not found in {}",
                    self.sessions.models_dir().display()
                )));
            }
        }

        self.config.try_save(&next).await?;

        let model_changed = current.preferred_model() != next.preferred_model();
        let context_changed = current.llm.context_size != next.llm.context_size;
        // Nothing to reload until the session was initialized.
        let loaded = self.sessions.status().await.state != SessionState::Unloaded;
        if loaded && (model_changed || context_changed) {
            info!(
                model = ?next.preferred_model(),
                context = next.llm.context_size,
                "Settings changed, reloading model"
            );
            self.coordinator.cancel_current();
            let status = self.sessions.reload().await;
            if status.ready {
                self.facts.spawn_refill();
            }
            self.events.broadcast(AssistantEvent::ModelReloaded {
                model_name: status.model_name.clone(),
            });
            self.events.broadcast(AssistantEvent::StatusChanged { status });
        }
        Ok(next)
    }

    /// One fun fact, falling back to a static one when nothing can generate.
    pub async fn fun_fact(&self) -> Fact {
        self.facts.next_fact().await
    }

    /// Cancel work in flight and unload the model.
    pub async fn shutdown(&self) {
        self.coordinator.cancel_current();
        self.sessions.shutdown().await;
    }
}
