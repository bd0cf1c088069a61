//! Generic pub/sub event bus used by every component's event surface.
//!
//! Built on `tokio::sync::broadcast` to fan state out to many subscribers
//! without back-pressuring the publisher. A lagging subscriber silently
//! drops the oldest events it hasn't read yet; every event also mirrors
//! durable in-memory state the subscriber can re-read, so this is an
//! acceptable trade-off here.

use tokio::sync::broadcast;

/// Default channel capacity; generous enough that a subscriber handling one
/// tick of a 100ms loop will not lag under normal load.
const DEFAULT_CAPACITY: usize = 1024;

/// A typed, multi-producer multi-consumer event bus.
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event. Returns the number of active subscribers that
    /// received it; `Err` only when there are currently none, which is not
    /// an error condition for the publisher.
    pub fn emit(&self, event: T) {
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus: EventBus<u32> = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(7);

        assert_eq!(rx1.recv().await.unwrap(), 7);
        assert_eq!(rx2.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_panic() {
        let bus: EventBus<u32> = EventBus::new();
        bus.emit(1);
    }
}
