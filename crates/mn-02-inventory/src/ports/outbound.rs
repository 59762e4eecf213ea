//! # Outbound Ports (Driven Ports)
//!
//! Implemented by the node runtime over its connection table.

use async_trait::async_trait;
use shared_types::{ConnectionId, ConnectionInfo, TransportError};

use crate::domain::{InventoryRequest, InventoryResponse};

#[async_trait]
pub trait InventoryTransport: Send + Sync {
    async fn send_request(
        &self,
        connection: &ConnectionId,
        request: InventoryRequest,
    ) -> Result<(), TransportError>;

    async fn send_response(
        &self,
        connection: &ConnectionId,
        response: InventoryResponse,
    ) -> Result<(), TransportError>;

    /// Live connections on every transport.
    fn connections(&self) -> Vec<ConnectionInfo>;
}
