//! # Resend Tracker (mn-04)
//!
//! Records outbound confidential messages until their delivery outcome is
//! known, persists them, and hands them back for resending.
//!
//! ```text
//! CONNECTING ─┬─> SENT ──> ACK_RECEIVED
//!             ├─> TRY_ADD_TO_MAILBOX ──> ADDED_TO_MAILBOX ──> MAILBOX_MSG_RECEIVED
//!             └─> FAILED
//! ```
//!
//! ## Invariants
//!
//! - A message is pending from `CONNECTING` until `FAILED`
//! - Intermediate states never change the pending set
//! - Manual resends are capped per message, automatic replays more tightly
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pending message record, durable set
//! - `ports/` - Persistence and the sender used for resends
//! - `service/` - The tracker

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use domain::*;
pub use ports::{ConfidentialSender, ResendPersistence};
pub use service::{ResendConfig, ResendMetricsSnapshot, ResendTracker};
