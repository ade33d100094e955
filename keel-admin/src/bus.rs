//! Fan-out of change events to in-process listeners.

use keel_core::TargetChangeEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast channel carrying [`TargetChangeEvent`]s to whoever cares —
/// cache invalidation, metrics, an audit log.
///
/// Publishing is fire-and-forget: events describe mutations that already
/// happened, so a listener that lags or is absent loses notifications, never
/// correctness.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TargetChangeEvent>,
}

impl EventBus {
    /// Create a bus retaining up to `capacity` undelivered events per
    /// subscriber before old ones are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TargetChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish one event to all current subscribers.
    pub fn publish(&self, event: TargetChangeEvent) {
        debug!(event = %event, "publishing change");
        // Err only means nobody is listening right now.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
