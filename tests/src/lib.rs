//! # Mesh-Net Test Suite
//!
//! Multi-node tests. Every node runs the full service stack in this process;
//! nodes talk over the in-memory hub instead of sockets.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs     # Node configs, start/stop, polling
//!     ├── replication.rs # Gossip and inventory sync
//!     └── messaging.rs   # Peer exchange, storage reports, confidential messages
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mn-tests
//! ```

#![allow(dead_code)]

pub mod integration;
