//! # Service Layer
//!
//! - `tracker.rs` - Pending set, status transitions and resends

mod config;
mod metrics;
mod tracker;


pub use config::ResendConfig;
pub use metrics::{ResendMetrics, ResendMetricsSnapshot};
pub use tracker::ResendTracker;
