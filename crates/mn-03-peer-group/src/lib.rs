//! # Peer Group and Peer Exchange (mn-03)
//!
//! Keeps one group of connected peers per transport type and learns new
//! addresses from the peers it talks to.
//!
//! ## Peer Views
//!
//! Every known peer lives once in an arena and is indexed by view:
//!
//! - **reported**: addresses other peers told us about (bounded)
//! - **persisted**: peers we connected to or merged, written to disk (bounded)
//! - **connected**: peers with a live connection
//!
//! ## Exchange
//!
//! ```text
//! Requester                                   Responder
//!     │── PeerExchangeRequest{nonce, peers} ──→│ merge peers,
//!     │                                        │ pick peers the requester lacks
//!     │←─ PeerExchangeResponse{nonce, peers} ──│
//!     │ merge into reported + persisted        │
//! ```
//!
//! ## Invariants
//!
//! - Seeds, banned addresses and our own address are never reported or merged
//! - Exchange messages carry at most 500 peers
//! - Bounded views evict their oldest non-connected peers first
//! - A failed or timed out exchange never affects other attempts
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Peer records, arena, messages, exchange policy
//! - `ports/` - Transport of one type, ban list, persistence
//! - `adapters/` - In-memory ban list
//! - `service/` - Peer group, strategy, exchange and maintenance

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use adapters::InMemoryBanList;
pub use domain::*;
pub use ports::{BanList, PeerGroupPersistence, PeerTransport};
pub use service::{
    HouseKeepingReport, MaintenanceConfig, PeerExchangeConfig, PeerExchangeService,
    PeerExchangeStrategy, PeerGroupConfig, PeerGroupManager, PeerGroupMetrics,
    PeerGroupMetricsSnapshot, PeerGroupService, RoundOutcome,
};
