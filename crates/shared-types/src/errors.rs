//! # Error Types
//!
//! Errors shared across services.

use thiserror::Error;

use crate::entities::{Address, ConnectionId};

/// Errors surfaced by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not open a connection to the peer.
    #[error("Connection to {address} failed: {reason}")]
    ConnectionFailed { address: Address, reason: String },

    /// The connection was closed before the operation completed.
    #[error("Connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// No live connection with this id.
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// The transport for this address type is not enabled.
    #[error("Transport not supported for address {0}")]
    UnsupportedTransport(Address),

    /// Message could not be encoded or decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Transport is shutting down.
    #[error("Transport shut down")]
    Shutdown,
}

/// Error parsing an `Address` from `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("Missing port in address: {0}")]
    MissingPort(String),

    #[error("Invalid port in address: {0}")]
    InvalidPort(String),

    #[error("Invalid host in address: {0}")]
    InvalidHost(String),
}

/// Hash bytes outside the accepted 20..=32 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid hash length: {0} (expected 20..=32 bytes)")]
pub struct InvalidHashLength(pub usize);
