//! Scripted in-memory inference backend.
//!
//! Replies are fixed lists of text pieces, optionally delayed, so tests can
//! drive sessions, the coordinator and the fact queue deterministically.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use paperclip_core::{
    ChatContext, GenerationOptions, InferenceBackend, InferenceError, LoadParams, LoadedModel,
    TokenSink,
};
use tokio_util::sync::CancellationToken;

/// Counters shared by a backend and everything it creates.
#[derive(Debug, Default)]
pub struct ScriptStats {
    loads: AtomicUsize,
    unloads: AtomicUsize,
    generations: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptStats {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    /// Number of `generate` calls across all contexts.
    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn record(&self, prompt: &str) -> usize {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.generations.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct Script {
    replies: Arc<Vec<Vec<String>>>,
    delay: Duration,
    fail_generation: Option<String>,
}

impl Script {
    fn new<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(vec![pieces.into_iter().map(Into::into).collect()]),
            delay: Duration::ZERO,
            fail_generation: None,
        }
    }

    fn reply(&self, call: usize) -> &[String] {
        self.replies
            .get(call % self.replies.len().max(1))
            .map_or(&[], Vec::as_slice)
    }
}

/// Backend whose models replay scripted replies.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Script,
    load_delay: Duration,
    load_error: Option<InferenceError>,
    stats: Arc<ScriptStats>,
}

impl ScriptedBackend {
    /// Every generation replies with `pieces`.
    pub fn new<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::new(pieces),
            load_delay: Duration::ZERO,
            load_error: None,
            stats: Arc::new(ScriptStats::default()),
        }
    }

    /// Add another reply; generation `n` uses reply `n % replies`.
    #[must_use]
    pub fn then_reply<I, S>(mut self, pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut replies = (*self.script.replies).clone();
        replies.push(pieces.into_iter().map(Into::into).collect());
        self.script.replies = Arc::new(replies);
        self
    }

    /// Wait `delay` before each piece.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = delay;
        self
    }

    /// Wait `delay` inside every `load_model` call.
    #[must_use]
    pub const fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Make every `load_model` call fail with `err`.
    #[must_use]
    pub fn failing_load(mut self, err: InferenceError) -> Self {
        self.load_error = Some(err);
        self
    }

    /// Make every generation fail after its pieces were delivered.
    #[must_use]
    pub fn failing_generation(mut self, message: impl Into<String>) -> Self {
        self.script.fail_generation = Some(message.into());
        self
    }

    pub fn stats(&self) -> Arc<ScriptStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn load_model(
        &self,
        path: &Path,
        _params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, InferenceError> {
        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if let Some(err) = &self.load_error {
            return Err(err.clone());
        }
        if !path.is_file() {
            return Err(InferenceError::ModelNotFound(path.display().to_string()));
        }
        let name = path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        Ok(Arc::new(ScriptedModel {
            name,
            script: self.script.clone(),
            stats: Arc::clone(&self.stats),
            released: CancellationToken::new(),
        }))
    }
}

/// A model loaded by [`ScriptedBackend`].
#[derive(Debug)]
pub struct ScriptedModel {
    name: String,
    script: Script,
    stats: Arc<ScriptStats>,
    released: CancellationToken,
}

#[async_trait]
impl LoadedModel for ScriptedModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn create_context(
        &self,
        system_prompt: Option<&str>,
    ) -> Result<Box<dyn ChatContext>, InferenceError> {
        if self.released.is_cancelled() {
            return Err(InferenceError::Disposed);
        }
        Ok(Box::new(ScriptedContext {
            script: self.script.clone(),
            stats: Arc::clone(&self.stats),
            released: self.released.clone(),
            system_prompt: system_prompt.map(str::to_string),
            history: Vec::new(),
        }))
    }

    async fn unload(&self) {
        if !self.released.is_cancelled() {
            self.released.cancel();
            self.stats.unloads.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A chat context replaying a script.
#[derive(Debug)]
pub struct ScriptedContext {
    script: Script,
    stats: Arc<ScriptStats>,
    released: CancellationToken,
    system_prompt: Option<String>,
    history: Vec<(String, String)>,
}

impl ScriptedContext {
    /// Standalone context that always replies with `pieces`.
    pub fn new<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::new(pieces),
            stats: Arc::new(ScriptStats::default()),
            released: CancellationToken::new(),
            system_prompt: None,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.script.fail_generation = Some(message.into());
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = delay;
        self
    }

    /// Committed `(prompt, reply)` pairs.
    pub fn history(&self) -> &[(String, String)] {
        &self.history
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }
}

#[async_trait]
impl ChatContext for ScriptedContext {
    async fn generate(
        &mut self,
        prompt: &str,
        _options: &GenerationOptions,
        cancel: &CancellationToken,
        on_token: &mut TokenSink<'_>,
    ) -> Result<(), InferenceError> {
        if self.released.is_cancelled() {
            return Err(InferenceError::Disposed);
        }
        let call = self.stats.record(prompt);

        for piece in self.script.reply(call) {
            if !self.script.delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.script.delay) => {}
                    () = cancel.cancelled() => return Ok(()),
                }
            }
            if cancel.is_cancelled() {
                return Ok(());
            }
            if on_token(piece).is_break() {
                return Ok(());
            }
        }

        match &self.script.fail_generation {
            Some(message) => Err(InferenceError::Generation(message.clone())),
            None => Ok(()),
        }
    }

    fn commit_turn(&mut self, prompt: &str, reply: &str) {
        self.history.push((prompt.to_string(), reply.to_string()));
    }
}
