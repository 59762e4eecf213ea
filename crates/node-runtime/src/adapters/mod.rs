//! # Adapters
//!
//! - `network.rs` - Connection table implementing the service ports
//! - `memory_hub.rs` - In-process links between nodes
//! - `tcp.rs` - Clear-net TCP links with length-prefixed frames
//! - `persistence.rs` - File or in-memory backends for every service
//! - `metrics_server.rs` - Prometheus scrape endpoint

pub mod memory_hub;
pub mod metrics_server;
pub mod network;
pub mod persistence;
pub mod tcp;

pub use memory_hub::{MemoryDialer, MemoryHub};
pub use metrics_server::MetricsServer;
pub use network::{Dialer, Link, NetworkEvent, NodeNetwork};
pub use persistence::PersistenceBackend;
pub use tcp::{TcpDialer, TcpServer};
