//! # Outbound Ports (Driven Ports)
//!
//! Production: the node runtime's connection table per transport type.
//! Testing: a loopback network in `service/tests.rs`.

use std::sync::Arc;

use async_trait::async_trait;
use shared_persistence::PersistenceStore;
use shared_types::{Address, ConnectionId, ConnectionInfo, TransportError, TransportType};

use crate::domain::{CloseReason, PeerExchangeRequest, PeerExchangeResponse, PeerStore};

pub type PeerGroupPersistence = Arc<dyn PersistenceStore<PeerStore>>;

/// Connections of a single transport type.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    fn transport_type(&self) -> TransportType;

    /// Our own reachable address, once known.
    fn my_address(&self) -> Option<Address>;

    fn connections(&self) -> Vec<ConnectionInfo>;

    /// Connect to `address`, or return the live connection to it.
    async fn connect(&self, address: &Address) -> Result<ConnectionInfo, TransportError>;

    async fn send_exchange_request(
        &self,
        connection: &ConnectionId,
        request: PeerExchangeRequest,
    ) -> Result<(), TransportError>;

    async fn send_exchange_response(
        &self,
        connection: &ConnectionId,
        response: PeerExchangeResponse,
    ) -> Result<(), TransportError>;

    async fn close(&self, connection: &ConnectionId, reason: CloseReason);
}

pub trait BanList: Send + Sync {
    fn is_banned(&self, address: &Address) -> bool;
}
