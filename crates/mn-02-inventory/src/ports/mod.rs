//! # Ports Layer
//!
//! - `outbound.rs` - Connections the inventory protocol talks over
//!
//! Storage is consumed through [`mn_01_data_storage::DataStorageApi`].

pub mod outbound;

pub use outbound::InventoryTransport;
