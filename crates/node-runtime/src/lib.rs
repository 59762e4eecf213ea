//! # Mesh-Net Node Runtime
//!
//! Builds the Mesh-Net services, connects them to a transport and runs
//! them. The binary in `main.rs` runs one node over TCP; tests run several
//! nodes in one process over the in-memory hub.
//!
//! ## Crate Structure
//!
//! - `adapters/` - Connection table, transports, persistence backends, metrics endpoint
//! - `container/` - Configuration and service construction
//! - `wiring/` - Wire messages and event routing
//! - `runtime.rs` - Start, operate and stop a node

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod runtime;
pub mod wiring;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use adapters::{
    Dialer, Link, MemoryDialer, MemoryHub, MetricsServer, NetworkEvent, NodeNetwork, PersistenceBackend,
    TcpDialer, TcpServer,
};
pub use container::{load_config, ConfigError, NodeConfig, ServiceContainer};
pub use runtime::{NodeRuntime, RuntimeError, StartupReport};
pub use wiring::{ConfidentialDelivery, NetworkMessage};
