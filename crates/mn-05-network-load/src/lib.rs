//! # Network Load (mn-05)
//!
//! Estimates how busy this node is from the traffic of its connections and
//! the size of its data stores. The estimate is bounded to `[0, 1]` and is
//! published with the difficulty adjustment factor used for proof of work.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Traffic windows, load formula
//! - `ports/` - Connection metrics source
//! - `service/` - Snapshot and periodic monitor

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use domain::*;
pub use ports::ConnectionMetricsSource;
pub use service::{NetworkLoadConfig, NetworkLoadMonitor, NetworkLoadSnapshot, NetworkLoadState};
