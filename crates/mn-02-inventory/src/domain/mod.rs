//! Domain layer: filters, inventories, wire messages and the request policy.

pub mod bloom;
pub mod errors;
pub mod filter;
pub mod inventory;
pub mod messages;
pub mod policy;

pub use bloom::BloomSummary;
pub use errors::InventoryError;
pub use filter::{DataFilter, FilterEntry};
pub use inventory::Inventory;
pub use messages::{InventoryRequest, InventoryResponse};
pub use policy::{InventoryRequestPolicy, PolicyAction, RequestOutcome};
