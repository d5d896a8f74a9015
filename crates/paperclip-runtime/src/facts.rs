//! Fun-fact prefetching.
//!
//! Facts are generated on ephemeral contexts so they never disturb the
//! primary conversation. A small queue keeps a few ready for instant display
//! and is refilled in the background, one refill at a time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use paperclip_core::{GenerationError, GenerationOptions, GenerationRequest};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::SessionManager;

/// Maximum number of queued facts.
pub const FACT_QUEUE_CAPACITY: usize = 5;

/// Queue depth background refills aim for.
pub const DEFAULT_MIN_FACTS: usize = 3;

/// Upper bound on the live tier of [`FactPrefetchQueue::next_fact`].
pub const DEFAULT_LIVE_TIMEOUT: Duration = Duration::from_secs(15);

const FACT_SYSTEM_PROMPT: &str = "You are Paperclip, a cheerful office assistant. \
You share short, surprising and true fun facts. Answer with the facts only.";

const FALLBACK_FACTS: &[&str] = &[
    "The double-loop paperclip shape is known as the Gem clip, after the British company that sold it.",
    "In 1899 William Middlebrook patented a machine for bending wire into paperclips.",
    "During World War II, Norwegians wore paperclips on their lapels as a quiet sign of resistance.",
    "A giant paperclip sculpture stands in Sandvika, Norway, in honour of inventor Johan Vaaler.",
    "Most paperclips are made from galvanized steel wire, which keeps them from rusting.",
];

#[derive(Debug, Error)]
pub enum FactError {
    /// No model is loaded.
    #[error("No model is ready to generate facts")]
    NotReady,

    /// The generation produced nothing usable.
    #[error("Generation produced no usable facts")]
    EmptyResult,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Produces fresh fun facts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Generate up to `count` facts.
    async fn fetch_facts(&self, count: usize) -> Result<Vec<String>, FactError>;
}

/// Generates facts on a fresh ephemeral context of the current session.
pub struct SessionFactSource {
    sessions: Arc<SessionManager>,
    timeout: Duration,
}

impl SessionFactSource {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            timeout: DEFAULT_LIVE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, count: usize) -> GenerationRequest {
        let prompt = if count <= 1 {
            "Tell me one short fun fact about paperclips or office life.".to_string()
        } else {
            format!(
                "Give me {count} different short fun facts about paperclips or office life, one per line."
            )
        };
        let max_tokens = u32::try_from(count.saturating_mul(48)).unwrap_or(u32::MAX).clamp(48, 512);
        GenerationRequest {
            prompt,
            options: GenerationOptions::default()
                .with_max_tokens(max_tokens)
                .with_temperature(0.9),
            timeout: self.timeout,
        }
    }
}

#[async_trait]
impl FactSource for SessionFactSource {
    async fn fetch_facts(&self, count: usize) -> Result<Vec<String>, FactError> {
        let session = self.sessions.current().await.ok_or(FactError::NotReady)?;
        let mut ctx = session
            .create_ephemeral_context(Some(FACT_SYSTEM_PROMPT))
            .await
            .map_err(GenerationError::from)?;

        let completion = ctx.generate(&self.request(count), &mut |_| {}).await?;
        ctx.dispose();

        let mut facts = parse_facts(&completion.text);
        facts.truncate(count.max(1));
        if facts.is_empty() {
            return Err(FactError::EmptyResult);
        }
        debug!(count = facts.len(), finish = %completion.finish, "Generated facts");
        Ok(facts)
    }
}

/// Split generated text into individual facts.
///
/// Drops list markers, surrounding quotes and lines too short to be a fact.
pub fn parse_facts(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line.trim_start_matches(|c: char| {
                c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | '•')
            });
            line.trim()
                .trim_matches(|c| matches!(c, '"' | '\u{201c}' | '\u{201d}'))
                .trim()
                .to_string()
        })
        .filter(|fact| fact.chars().filter(|c| c.is_alphanumeric()).count() >= 8)
        .collect()
}

/// Normalized form used for duplicate detection.
fn dedup_key(fact: &str) -> String {
    fact.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Where a fact handed out by [`FactPrefetchQueue::next_fact`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FactOrigin {
    Queued,
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    pub text: String,
    pub origin: FactOrigin,
}

/// Scope guard for the single refill slot.
struct RefillGuard<'a> {
    refilling: &'a AtomicBool,
}

impl<'a> RefillGuard<'a> {
    fn try_acquire(refilling: &'a AtomicBool) -> Option<Self> {
        refilling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { refilling })
    }
}

impl Drop for RefillGuard<'_> {
    fn drop(&mut self) {
        self.refilling.store(false, Ordering::SeqCst);
    }
}

/// Bounded, deduplicated buffer of pre-generated facts.
pub struct FactPrefetchQueue {
    source: Arc<dyn FactSource>,
    queue: Mutex<VecDeque<String>>,
    capacity: usize,
    refilling: AtomicBool,
    live_timeout: Duration,
    next_fallback: AtomicUsize,
}

impl FactPrefetchQueue {
    pub fn new(source: Arc<dyn FactSource>) -> Self {
        Self {
            source,
            queue: Mutex::new(VecDeque::new()),
            capacity: FACT_QUEUE_CAPACITY,
            refilling: AtomicBool::new(false),
            live_timeout: DEFAULT_LIVE_TIMEOUT,
            next_fallback: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub const fn with_live_timeout(mut self, timeout: Duration) -> Self {
        self.live_timeout = timeout;
        self
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    pub fn is_refilling(&self) -> bool {
        self.refilling.load(Ordering::SeqCst)
    }

    /// Fill the queue up to `min_count` entries.
    ///
    /// Returns the number of facts added. A no-op while another refill runs
    /// or when the queue is already deep enough.
    pub async fn top_up(&self, min_count: usize) -> usize {
        let target = min_count.min(self.capacity);
        let have = self.len();
        if have >= target {
            return 0;
        }
        let Some(_refill) = RefillGuard::try_acquire(&self.refilling) else {
            debug!("Fact refill already running");
            return 0;
        };

        let wanted = target.saturating_sub(have).max(1);
        match self.source.fetch_facts(wanted).await {
            Ok(facts) => {
                let added = self.push_unique(facts);
                debug!(wanted, added, queued = self.len(), "Fact queue topped up");
                added
            }
            Err(e) => {
                debug!(error = %e, "Fact refill failed");
                0
            }
        }
    }

    /// Pop the oldest queued fact.
    pub fn take(&self) -> Option<String> {
        self.queue().pop_front()
    }

    /// A fact right now: queued, else generated live, else a static one.
    ///
    /// Always schedules a background refill afterwards.
    pub async fn next_fact(self: &Arc<Self>) -> Fact {
        let fact = if let Some(text) = self.take() {
            Fact {
                text,
                origin: FactOrigin::Queued,
            }
        } else {
            self.live_fact().await.unwrap_or_else(|| self.fallback())
        };
        self.spawn_refill();
        fact
    }

    /// Start a background refill toward [`DEFAULT_MIN_FACTS`].
    pub fn spawn_refill(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.top_up(DEFAULT_MIN_FACTS).await;
        });
    }

    async fn live_fact(&self) -> Option<Fact> {
        match tokio::time::timeout(self.live_timeout, self.source.fetch_facts(1)).await {
            Ok(Ok(facts)) => {
                let mut facts = facts.into_iter();
                let text = facts.next()?;
                self.push_unique(facts.collect());
                Some(Fact {
                    text,
                    origin: FactOrigin::Live,
                })
            }
            Ok(Err(FactError::NotReady)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "Live fact generation failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.live_timeout, "Live fact generation timed out");
                None
            }
        }
    }

    fn fallback(&self) -> Fact {
        let idx = self.next_fallback.fetch_add(1, Ordering::Relaxed) % FALLBACK_FACTS.len();
        Fact {
            text: FALLBACK_FACTS[idx].to_string(),
            origin: FactOrigin::Fallback,
        }
    }

    fn push_unique(&self, facts: Vec<String>) -> usize {
        let mut queue = self.queue();
        let mut seen: Vec<String> = queue.iter().map(|f| dedup_key(f)).collect();
        let mut added = 0;
        for fact in facts {
            if queue.len() >= self.capacity {
                break;
            }
            let key = dedup_key(&fact);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            queue.push_back(fact);
            added += 1;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn facts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    /// Slow source counting its calls.
    struct SlowSource {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl FactSource for SlowSource {
        async fn fetch_facts(&self, count: usize) -> Result<Vec<String>, FactError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok((0..count)
                .map(|i| format!("Paperclip fact number {call}-{i}"))
                .collect())
        }
    }

    #[test]
    fn test_parse_facts() {
        let parsed = parse_facts(
            "1. Paperclips were patented in 1899.\n\n- \"Gem clips have two loops.\"\nok\n",
        );
        assert_eq!(
            parsed,
            ["Paperclips were patented in 1899.", "Gem clips have two loops."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_top_up_is_single_flight() {
        let source = Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
        });
        let queue = FactPrefetchQueue::new(source.clone());

        let (a, b) = tokio::join!(queue.top_up(3), queue.top_up(3));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a + b, 3);
        assert_eq!(queue.len(), 3);
        assert!(!queue.is_refilling());
    }

    #[tokio::test]
    async fn test_top_up_noop_when_full_enough() {
        let mut source = MockFactSource::new();
        source
            .expect_fetch_facts()
            .with(eq(2))
            .times(1)
            .returning(|_| Ok(facts(&["Fact one about clips", "Fact two about clips"])));
        let queue = FactPrefetchQueue::new(Arc::new(source));

        assert_eq!(queue.top_up(2).await, 2);
        assert_eq!(queue.top_up(2).await, 0);
    }

    #[tokio::test]
    async fn test_duplicates_and_capacity() {
        let mut source = MockFactSource::new();
        source.expect_fetch_facts().returning(|_| {
            Ok(facts(&[
                "Clips are made of steel wire.",
                "clips are made of steel wire",
                "The Gem clip has two loops.",
                "Paperclips hold paper together.",
                "Vaaler designed a clip in 1899.",
            ]))
        });
        let queue = FactPrefetchQueue::new(Arc::new(source)).with_capacity(3);

        assert_eq!(queue.top_up(5).await, 3);
        assert_eq!(queue.take().as_deref(), Some("Clips are made of steel wire."));
        assert_eq!(queue.take().as_deref(), Some("The Gem clip has two loops."));
    }

    #[tokio::test]
    async fn test_fetches_at_least_one() {
        let mut source = MockFactSource::new();
        source
            .expect_fetch_facts()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(facts(&["Another paperclip fact"])));
        let queue = FactPrefetchQueue::new(Arc::new(source));
        queue.queue().push_back("Existing queued fact".into());

        assert_eq!(queue.top_up(2).await, 1);
    }

    #[tokio::test]
    async fn test_next_fact_prefers_queue() {
        let mut source = MockFactSource::new();
        source
            .expect_fetch_facts()
            .returning(|n| Ok((0..n).map(|i| format!("Background fact {i} here")).collect()));
        let queue = Arc::new(FactPrefetchQueue::new(Arc::new(source)));
        queue.queue().push_back("Queued paperclip fact".into());

        let fact = queue.next_fact().await;
        assert_eq!(fact.origin, FactOrigin::Queued);
        assert_eq!(fact.text, "Queued paperclip fact");
    }

    #[tokio::test]
    async fn test_next_fact_goes_live_when_empty() {
        let mut source = MockFactSource::new();
        source
            .expect_fetch_facts()
            .returning(|_| Ok(facts(&["A live paperclip fact"])));
        let queue = Arc::new(FactPrefetchQueue::new(Arc::new(source)));

        let fact = queue.next_fact().await;
        assert_eq!(fact.origin, FactOrigin::Live);
        assert_eq!(fact.text, "A live paperclip fact");
    }

    #[tokio::test]
    async fn test_next_fact_falls_back_on_empty_result() {
        let mut source = MockFactSource::new();
        source
            .expect_fetch_facts()
            .returning(|_| Err(FactError::EmptyResult));
        let queue = Arc::new(FactPrefetchQueue::new(Arc::new(source)));

        let fact = queue.next_fact().await;
        assert_eq!(fact.origin, FactOrigin::Fallback);
        assert!(FALLBACK_FACTS.contains(&fact.text.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_tier_is_bounded() {
        let source = Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(60),
        });
        let queue = Arc::new(
            FactPrefetchQueue::new(source).with_live_timeout(Duration::from_millis(500)),
        );

        let fact = queue.next_fact().await;
        assert_eq!(fact.origin, FactOrigin::Fallback);
    }
}
