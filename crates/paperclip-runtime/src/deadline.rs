//! Wall-clock timeouts expressed as cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels a token once a duration has elapsed.
///
/// The timer is disarmed when the guard drops, so it never outlives the
/// operation it bounds.
#[derive(Debug)]
pub struct Deadline {
    fired: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

impl Deadline {
    /// Arm a timer that cancels `token` after `after`.
    pub fn arm(token: CancellationToken, after: Duration) -> Self {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let timer = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(after) => {
                    // Flag before cancelling so observers of the token see it set.
                    flag.store(true, Ordering::SeqCst);
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        });
        Self { fired, timer }
    }

    /// True if the timer cancelled the token.
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_duration() {
        let token = CancellationToken::new();
        let deadline = Deadline::arm(token.clone(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!token.is_cancelled());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(token.is_cancelled());
        assert!(deadline.fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_disarms() {
        let token = CancellationToken::new();
        drop(Deadline::arm(token.clone(), Duration::from_millis(10)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_is_not_a_timeout() {
        let token = CancellationToken::new();
        let deadline = Deadline::arm(token.clone(), Duration::from_millis(100));
        token.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!deadline.fired());
    }
}
