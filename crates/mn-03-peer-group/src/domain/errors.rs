//! Peer group error types.

use shared_persistence::PersistenceError;
use shared_types::{Address, ConnectionId, TransportError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerGroupError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no peer exchange response from {address} within {timeout:?}")]
    Timeout { address: Address, timeout: Duration },

    #[error("peer exchange on {0} cancelled")]
    Cancelled(ConnectionId),

    #[error("invalid peer exchange response from {0}")]
    InvalidResponse(Address),

    #[error("{0} is banned")]
    Banned(Address),

    #[error("persisting peers failed: {0}")]
    Persistence(#[from] PersistenceError),
}
