//! # Event Publisher
//!
//! Publishing side of the bus. Publishing is synchronous so it can be done
//! right after a store lock is released without an await point.

use crate::events::{BusEvent, EventFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Interface services use to emit events.
pub trait EventPublisher<E: BusEvent>: Send + Sync {
    /// Publish an event. Returns the number of subscribers that will see it.
    fn publish(&self, event: E) -> usize;

    /// Total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory bus over `tokio::sync::broadcast`.
pub struct InMemoryEventBus<E: BusEvent> {
    sender: broadcast::Sender<E>,
    events_published: AtomicU64,
    capacity: usize,
}

impl<E: BusEvent> InMemoryEventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter<E::Topic>) -> Subscription<E> {
        debug!(topics = ?filter.topics, "New subscription created");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Subscription as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter<E::Topic>) -> EventStream<E> {
        EventStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<E: BusEvent> Default for InMemoryEventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventPublisher<E> for InMemoryEventBus<E> {
    fn publish(&self, event: E) -> usize {
        let topic = event.topic();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(topic = ?topic, receivers, "Event published");
                receivers
            }
            Err(_) => {
                // Nobody listening is normal during startup and in tests.
                trace!(topic = ?topic, "Event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_events::{TestEvent, TestTopic};

    #[test]
    fn test_publish_without_subscribers() {
        let bus = InMemoryEventBus::<TestEvent>::new();
        assert_eq!(bus.publish(TestEvent::DataAdded(1)), 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[test]
    fn test_publish_counts_receivers() {
        let bus = InMemoryEventBus::<TestEvent>::new();
        let _a = bus.subscribe(EventFilter::all());
        let _b = bus.subscribe(EventFilter::topics(vec![TestTopic::Peers]));

        // Filtering happens on the receiving side.
        assert_eq!(bus.publish(TestEvent::DataAdded(1)), 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_capacity() {
        let bus = InMemoryEventBus::<TestEvent>::with_capacity(16);
        assert_eq!(bus.capacity(), 16);
    }
}
