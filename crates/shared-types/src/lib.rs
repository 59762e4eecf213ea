//! # Shared Types Crate
//!
//! Types shared by every Mesh-Net service: peer addresses tagged with their
//! transport, content hashes, connection handles, message delivery states
//! and the clock abstraction.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Cross-service identifiers live here only.
//! - **Transport Agnostic**: An [`Address`] carries its [`TransportType`] so
//!   services never need to know how a socket is opened.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod delivery;
pub mod entities;
pub mod errors;
pub mod time;

pub use delivery::MessageDeliveryStatus;
pub use entities::*;
pub use errors::*;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
