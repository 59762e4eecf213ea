//! # Service Layer
//!
//! - `requester.rs` - Waiting table and request round trips
//! - `responder.rs` - Answers to peers' requests
//! - `inventory_service.rs` - Initial sync and periodic requests

mod config;
mod inventory_service;
mod metrics;
mod requester;
mod responder;

#[cfg(test)]
mod tests;

pub use config::InventoryConfig;
pub use inventory_service::{AppliedInventory, InventoryService};
pub use metrics::{InventoryMetrics, InventoryMetricsSnapshot};
pub use requester::{InventoryRequester, PendingGuard, PendingRequests};
pub use responder::{CompletionHook, InventoryResponder};
