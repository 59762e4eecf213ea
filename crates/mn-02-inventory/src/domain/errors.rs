//! Inventory error types.

use shared_types::{ConnectionId, TransportError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("no inventory response from {connection} within {timeout:?}")]
    Timeout {
        connection: ConnectionId,
        timeout: Duration,
    },

    #[error("inventory request on {0} cancelled")]
    Cancelled(ConnectionId),

    #[error("sending inventory message failed: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid data filter from {0}")]
    InvalidFilter(ConnectionId),
}
