//! # Wire Messages
//!
//! Every frame carries one bincode-encoded [`NetworkMessage`]. The dialing
//! side opens with `Hello` so the acceptor learns the address it listens on.

use mn_01_data_storage::{DataRequest, StorageReport};
use mn_02_inventory::{InventoryRequest, InventoryResponse};
use mn_03_peer_group::{PeerExchangeRequest, PeerExchangeResponse};
use serde::{Deserialize, Serialize};
use shared_types::{Address, NetworkId, TransportError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetworkMessage {
    Hello {
        address: Address,
    },
    /// Gossiped add, remove or refresh. Fire and forget.
    Data(DataRequest),
    StorageReportingRequest {
        request_id: u32,
    },
    StorageReportingResponse {
        request_id: u32,
        storage_report: StorageReport,
    },
    InventoryRequest(InventoryRequest),
    InventoryResponse(InventoryResponse),
    PeerExchangeRequest(PeerExchangeRequest),
    PeerExchangeResponse(PeerExchangeResponse),
    /// Point-to-point message, tracked for resending by the sender.
    ConfidentialMessage {
        message_id: String,
        sender_network_id: NetworkId,
        payload: Vec<u8>,
    },
    ConfidentialAck {
        message_id: String,
    },
}

impl NetworkMessage {
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        bincode::serialize(self).map_err(|e| TransportError::Encoding(e.to_string()))
    }

    pub fn decode(frame: &[u8]) -> Result<Self, TransportError> {
        bincode::deserialize(frame).map_err(|e| TransportError::Encoding(e.to_string()))
    }

    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            NetworkMessage::Hello { .. } => "Hello",
            NetworkMessage::Data(request) => request.name(),
            NetworkMessage::StorageReportingRequest { .. } => "StorageReportingRequest",
            NetworkMessage::StorageReportingResponse { .. } => "StorageReportingResponse",
            NetworkMessage::InventoryRequest(_) => "InventoryRequest",
            NetworkMessage::InventoryResponse(_) => "InventoryResponse",
            NetworkMessage::PeerExchangeRequest(_) => "PeerExchangeRequest",
            NetworkMessage::PeerExchangeResponse(_) => "PeerExchangeResponse",
            NetworkMessage::ConfidentialMessage { .. } => "ConfidentialMessage",
            NetworkMessage::ConfidentialAck { .. } => "ConfidentialAck",
        }
    }
}
