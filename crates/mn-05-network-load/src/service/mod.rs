//! # Service Layer
//!
//! - `snapshot.rs` - Current and previous load
//! - `monitor.rs` - Periodic sampling

mod config;
mod monitor;
mod snapshot;


pub use config::NetworkLoadConfig;
pub use monitor::NetworkLoadMonitor;
pub use snapshot::{NetworkLoadSnapshot, NetworkLoadState};
