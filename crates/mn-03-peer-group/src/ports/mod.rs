//! # Ports Layer
//!
//! - `outbound.rs` - Connections on one transport, and the ban list

pub mod outbound;

pub use outbound::{BanList, PeerGroupPersistence, PeerTransport};
