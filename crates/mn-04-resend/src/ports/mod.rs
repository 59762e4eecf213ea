//! # Ports Layer
//!
//! - `outbound.rs` - Persistence of the pending set and the message sender

pub mod outbound;

pub use outbound::{ConfidentialSender, ResendPersistence};
