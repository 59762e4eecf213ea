//! Cross-service flows between running nodes.

pub mod harness;
pub mod messaging;
pub mod replication;
