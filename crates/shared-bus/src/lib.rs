//! # Shared Bus - Event Fan-Out for Mesh-Net Services
//!
//! Data storage publishes every add, remove and refresh to a typed
//! in-memory bus; every interested component holds its own [`Subscription`].
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Data Storage │    publish()       │ Bonded role  │
//! │              │ ──────┐            │   registry   │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Each subscriber owns a separate broadcast receiver, so a slow or failing
//! subscriber never blocks the publisher or other subscribers. A subscriber
//! that lags past the channel capacity loses the oldest events and logs it.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{BusEvent, EventFilter};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
