//! # Inventory Reconciliation (mn-02)
//!
//! Pull-based anti-entropy between peers. A node sends a [`DataFilter`]
//! describing what it holds; the peer answers with an [`Inventory`] of
//! everything the filter lacks, cut off at a byte budget.
//!
//! ## Protocol
//!
//! ```text
//! Requester                              Responder
//!     │── InventoryRequest{filter, nonce} ──→│
//!     │                                      │ filter all stores,
//!     │                                      │ order, apply budget
//!     │←─ InventoryResponse{inventory, nonce}│
//!     │ apply entries to storage             │
//! ```
//!
//! ## Invariants
//!
//! - A response is paired with its request by nonce and connection
//! - Nothing stays in the waiting table after its connection closed
//! - `num_dropped` counts exactly the missing entries withheld by the budget
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Filters, inventory builder, wire messages, request policy
//! - `ports/` - Transport the protocol runs over
//! - `service/` - Requester, responder and the sync policy driver

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use domain::*;
pub use ports::InventoryTransport;
pub use service::{
    AppliedInventory, CompletionHook, InventoryConfig, InventoryMetricsSnapshot, InventoryRequester,
    InventoryResponder, InventoryService, PendingRequests,
};
