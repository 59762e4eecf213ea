//! # Event Subscriber
//!
//! Each subscription owns its own broadcast receiver. Lagging receivers skip
//! the overwritten events and keep going.

use crate::events::{BusEvent, EventFilter};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event bus closed")]
    Closed,
}

/// Handle for receiving events that match a filter.
pub struct Subscription<E: BusEvent> {
    receiver: broadcast::Receiver<E>,
    filter: EventFilter<E::Topic>,
}

impl<E: BusEvent> Subscription<E> {
    pub(crate) fn new(receiver: broadcast::Receiver<E>, filter: EventFilter<E::Topic>) -> Self {
        Self { receiver, filter }
    }

    /// Next matching event, or `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Subscriber lagged, events dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Non-blocking receive. `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<E>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(lagged = count, "Subscriber lagged, events dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter<E::Topic> {
        &self.filter
    }
}

/// `Stream` adapter over a filtered subscription.
pub struct EventStream<E: BusEvent> {
    inner: Pin<Box<dyn Stream<Item = E> + Send>>,
    filter: EventFilter<E::Topic>,
}

impl<E: BusEvent> EventStream<E> {
    pub(crate) fn new(receiver: broadcast::Receiver<E>, filter: EventFilter<E::Topic>) -> Self {
        let stream_filter = filter.clone();
        let inner = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(event) if stream_filter.matches(&event) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(count)) => {
                warn!(lagged = count, "Event stream lagged, events dropped");
                None
            }
        });
        Self {
            inner: Box::pin(inner),
            filter,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter<E::Topic> {
        &self.filter
    }
}

// The inner stream is already boxed and the filter is never pinned.
impl<E: BusEvent> Unpin for EventStream<E> {}

impl<E: BusEvent> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_events::{TestEvent, TestTopic};
    use crate::publisher::{EventPublisher, InMemoryEventBus};
    use std::marker::PhantomPinned;
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct PinnedTopic(PhantomPinned);

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct PinnedEvent(u32);

    impl BusEvent for PinnedEvent {
        type Topic = PinnedTopic;

        fn topic(&self) -> PinnedTopic {
            PinnedTopic(PhantomPinned)
        }
    }

    fn assert_unpin<T: Unpin>() {}

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.publish(TestEvent::DataAdded(7));

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received, TestEvent::DataAdded(7));
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![TestTopic::Peers]));

        bus.publish(TestEvent::DataAdded(1));
        bus.publish(TestEvent::PeerConnected("n1".into()));

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received, TestEvent::PeerConnected("n1".into()));
    }

    #[tokio::test]
    async fn test_subscribers_are_isolated() {
        let bus = InMemoryEventBus::new();
        let mut fast = bus.subscribe(EventFilter::all());
        let slow = bus.subscribe(EventFilter::all());

        bus.publish(TestEvent::DataAdded(1));
        drop(slow);
        bus.publish(TestEvent::DataAdded(2));

        assert_eq!(fast.try_recv(), Ok(Some(TestEvent::DataAdded(1))));
        assert_eq!(fast.try_recv(), Ok(Some(TestEvent::DataAdded(2))));
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_ahead() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());

        for i in 0..5 {
            bus.publish(TestEvent::DataAdded(i));
        }

        assert_eq!(sub.try_recv(), Ok(Some(TestEvent::DataAdded(3))));
        assert_eq!(sub.try_recv(), Ok(Some(TestEvent::DataAdded(4))));
        assert_eq!(sub.try_recv(), Ok(None));
    }

    #[tokio::test]
    async fn test_recv_none_after_bus_dropped() {
        let bus = InMemoryEventBus::<TestEvent>::new();
        let mut sub = bus.subscribe(EventFilter::all());
        drop(bus);
        assert_eq!(sub.recv().await, None);
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }

    #[tokio::test]
    async fn test_event_stream() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::topics(vec![TestTopic::Storage]));

        bus.publish(TestEvent::PeerConnected("x".into()));
        bus.publish(TestEvent::DataAdded(3));

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout");
        assert_eq!(next, Some(TestEvent::DataAdded(3)));
        assert_eq!(EventStream::filter(&stream).topics, vec![TestTopic::Storage]);
    }

    #[tokio::test]
    async fn test_event_stream_unpin_with_pinned_topic() {
        assert_unpin::<EventStream<PinnedEvent>>();

        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::topics(vec![PinnedTopic(PhantomPinned)]));
        bus.publish(PinnedEvent(5));

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout");
        assert_eq!(next, Some(PinnedEvent(5)));
    }
}
