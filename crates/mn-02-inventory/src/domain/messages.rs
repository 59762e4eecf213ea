//! Inventory wire messages.

use serde::{Deserialize, Serialize};

use super::filter::DataFilter;
use super::inventory::Inventory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRequest {
    pub data_filter: DataFilter,
    pub nonce: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub inventory: Inventory,
    pub request_nonce: u32,
}
