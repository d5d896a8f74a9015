//! Stop-sequence detection over a stream of text pieces.
//!
//! Pieces arrive with arbitrary boundaries, so a stop sequence may be split
//! across several of them. The matcher holds back any tail that could still
//! grow into a stop sequence and only releases it once it provably cannot.

/// Result of feeding one piece to a [`StopMatcher`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StopStep {
    /// Text that is safe to deliver.
    pub emit: String,
    /// A stop sequence matched; nothing after it may be delivered.
    pub stopped: bool,
}

/// Incremental stop-sequence matcher.
#[derive(Debug)]
pub struct StopMatcher {
    stops: Vec<String>,
    pending: String,
    stopped: bool,
}

impl StopMatcher {
    pub fn new(stops: &[String]) -> Self {
        Self {
            stops: stops.iter().filter(|s| !s.is_empty()).cloned().collect(),
            pending: String::new(),
            stopped: false,
        }
    }

    /// Feed the next piece of generated text.
    pub fn push(&mut self, piece: &str) -> StopStep {
        if self.stopped {
            return StopStep {
                emit: String::new(),
                stopped: true,
            };
        }
        self.pending.push_str(piece);

        // Earliest match wins.
        let hit = self
            .stops
            .iter()
            .filter_map(|stop| self.pending.find(stop.as_str()))
            .min();

        if let Some(idx) = hit {
            self.stopped = true;
            let emit = self.pending[..idx].to_string();
            self.pending.clear();
            return StopStep {
                emit,
                stopped: true,
            };
        }

        let keep_from = self.held_suffix_start();
        let emit = self.pending[..keep_from].to_string();
        self.pending.drain(..keep_from);
        StopStep {
            emit,
            stopped: false,
        }
    }

    /// Release whatever is still held back once the stream has ended.
    pub fn finish(&mut self) -> String {
        if self.stopped {
            return String::new();
        }
        std::mem::take(&mut self.pending)
    }

    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Byte offset of the longest suffix of `pending` that is a proper
    /// prefix of some stop sequence, or `pending.len()` if there is none.
    fn held_suffix_start(&self) -> usize {
        self.pending
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| {
                let tail = &self.pending[i..];
                self.stops.iter().any(|stop| stop.starts_with(tail))
            })
            .unwrap_or(self.pending.len())
    }
}
