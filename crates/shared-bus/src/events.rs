//! # Bus Events
//!
//! The bus is generic over the event type so every service can define its
//! own event enum without the bus depending on it.

use std::fmt::Debug;
use std::hash::Hash;

/// An event that can travel through the bus.
pub trait BusEvent: Clone + Debug + Send + Sync + 'static {
    /// Coarse category used for subscription filtering.
    type Topic: Copy + Debug + Eq + Hash + Send + Sync + 'static;

    fn topic(&self) -> Self::Topic;
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone)]
pub struct EventFilter<T> {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<T>,
}

impl<T> Default for EventFilter<T> {
    fn default() -> Self {
        Self { topics: Vec::new() }
    }
}

impl<T: Copy + Eq> EventFilter<T> {
    /// Accept every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn topics(topics: Vec<T>) -> Self {
        Self { topics }
    }

    #[must_use]
    pub fn matches<E>(&self, event: &E) -> bool
    where
        E: BusEvent<Topic = T>,
    {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }
}

#[cfg(test)]
pub(crate) mod test_events {
    use super::BusEvent;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum TestTopic {
        Storage,
        Peers,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TestEvent {
        DataAdded(u32),
        PeerConnected(String),
    }

    impl BusEvent for TestEvent {
        type Topic = TestTopic;

        fn topic(&self) -> TestTopic {
            match self {
                TestEvent::DataAdded(_) => TestTopic::Storage,
                TestEvent::PeerConnected(_) => TestTopic::Peers,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_events::{TestEvent, TestTopic};
    use super::*;

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::<TestTopic>::all();
        assert!(filter.matches(&TestEvent::DataAdded(1)));
        assert!(filter.matches(&TestEvent::PeerConnected("a".into())));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![TestTopic::Storage]);
        assert!(filter.matches(&TestEvent::DataAdded(1)));
        assert!(!filter.matches(&TestEvent::PeerConnected("a".into())));
    }
}
