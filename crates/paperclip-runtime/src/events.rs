//! Assistant event broadcasting.

use paperclip_core::AssistantEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast channel capacity for assistant events.
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out of [`AssistantEvent`]s to any number of front ends.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<AssistantEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Broadcast an event. A no-op when nobody is subscribed.
    pub fn broadcast(&self, event: AssistantEvent) {
        if self.sender.receiver_count() > 0 {
            trace!(?event, "Broadcasting assistant event");
            let _ = self.sender.send(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
