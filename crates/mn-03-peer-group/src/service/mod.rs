//! # Service Layer
//!
//! - `peer_group.rs` - Peer views, seeds and connection bookkeeping
//! - `strategy.rs` - Candidate selection, reporting and merging
//! - `exchange.rs` - Exchange rounds, retries and inbound requests
//! - `manager.rs` - Initialization and periodic house keeping

mod config;
mod exchange;
mod manager;
mod metrics;
mod peer_group;
mod strategy;
mod waiters;

#[cfg(test)]
mod tests;

pub use config::{MaintenanceConfig, PeerExchangeConfig, PeerGroupConfig};
pub use exchange::{PeerExchangeService, RoundOutcome};
pub use manager::{HouseKeepingReport, PeerGroupManager};
pub use metrics::{PeerGroupMetrics, PeerGroupMetricsSnapshot};
pub use peer_group::PeerGroupService;
pub use strategy::PeerExchangeStrategy;
pub use waiters::{ExchangeWaiters, WaiterGuard};
