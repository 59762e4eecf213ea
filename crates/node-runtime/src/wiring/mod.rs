//! # Wiring
//!
//! Connects the network to the services.
//!
//! ```text
//!   NodeNetwork ──NetworkEvent──→ MessageRouter
//!                                      │
//!        ┌──────────────┬──────────────┼───────────────┬──────────────┐
//!        ↓              ↓              ↓               ↓              ↓
//!   DataStorage    Inventory      PeerExchange    ReportRequests   Resend /
//!   (+ gossip)                                                     inbox
//! ```
//!
//! - `messages.rs` - Wire envelope and its encoding
//! - `router.rs` - Event dispatch and data gossip
//! - `reporting.rs` - Storage report round trips
//! - `telemetry.rs` - Service counters into Prometheus

pub mod messages;
pub mod reporting;
pub mod router;
pub mod telemetry;

pub use messages::NetworkMessage;
pub use reporting::{ReportGuard, ReportRequests};
pub use router::{ConfidentialDelivery, MessageRouter};
pub use telemetry::MetricsMirror;
