//! # Core Network Entities
//!
//! ## Clusters
//!
//! - **Addressing**: `Address`, `TransportType`, `NetworkId`
//! - **Content**: `DataHash`
//! - **Connections**: `ConnectionId`, `ConnectionInfo`, `ConnectionDirection`

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AddressParseError;

// =============================================================================
// CLUSTER A: ADDRESSING
// =============================================================================

/// Network substrate a peer is reachable on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportType {
    /// Onion-routed hidden service.
    Tor,
    /// Garlic-routed destination.
    I2p,
    /// Plain TCP/IP.
    Clear,
}

impl TransportType {
    /// All transports in a stable order.
    pub const ALL: [TransportType; 3] = [TransportType::Tor, TransportType::I2p, TransportType::Clear];

    /// Lowercase name used in file names and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Tor => "tor",
            TransportType::I2p => "i2p",
            TransportType::Clear => "clear",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host and port of a peer. The transport is derived from the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loopback clear-net address, mostly used by tests and local setups.
    pub fn localhost(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport_type(&self) -> TransportType {
        if self.host.ends_with(".onion") {
            TransportType::Tor
        } else if self.host.ends_with(".i2p") {
            TransportType::I2p
        } else {
            TransportType::Clear
        }
    }

    /// Cheap syntactic check applied to addresses received from peers.
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty()
            && self.host.len() <= 255
            && self.port != 0
            && !self.host.chars().any(|c| c.is_whitespace() || c == '/')
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressParseError::InvalidPort(s.to_string()))?;
        let address = Address::new(host, port);
        if !address.is_valid() {
            return Err(AddressParseError::InvalidHost(s.to_string()));
        }
        Ok(address)
    }
}

/// Identity of a logical node: its address on each transport plus its public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId {
    pub address_by_transport: BTreeMap<TransportType, Address>,
    pub public_key: Vec<u8>,
}

impl NetworkId {
    pub fn new(address_by_transport: BTreeMap<TransportType, Address>, public_key: Vec<u8>) -> Self {
        Self {
            address_by_transport,
            public_key,
        }
    }

    pub fn address(&self, transport: TransportType) -> Option<&Address> {
        self.address_by_transport.get(&transport)
    }
}

// =============================================================================
// CLUSTER B: CONTENT
// =============================================================================

/// Content hash used as the key of every data store.
///
/// Between 20 and 32 bytes long, compared by value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataHash(Vec<u8>);

impl DataHash {
    pub const MIN_LEN: usize = 20;
    pub const MAX_LEN: usize = 32;

    /// Wrap raw hash bytes, rejecting lengths outside 20..=32.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, crate::errors::InvalidHashLength> {
        if bytes.len() < Self::MIN_LEN || bytes.len() > Self::MAX_LEN {
            return Err(crate::errors::InvalidHashLength(bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Wrap a 32-byte digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest.to_vec())
    }

    /// Wrap a 20-byte digest.
    pub fn from_short_digest(digest: [u8; 20]) -> Self {
        Self(digest.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length is within bounds. Hashes decoded from the wire bypass
    /// [`DataHash::from_slice`], so receivers check this.
    pub fn is_valid(&self) -> bool {
        (Self::MIN_LEN..=Self::MAX_LEN).contains(&self.0.len())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataHash({})", self.to_hex())
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        f.write_str(&hex[..hex.len().min(16)])
    }
}

// =============================================================================
// CLUSTER C: CONNECTIONS
// =============================================================================

/// Opaque handle for one live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Fresh random id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionDirection {
    Inbound,
    Outbound,
}

/// Snapshot of a live connection as seen by the services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_address: Address,
    pub direction: ConnectionDirection,
    /// Unix millis when the handshake completed.
    pub established_at: u64,
}

impl ConnectionInfo {
    pub fn transport_type(&self) -> TransportType {
        self.peer_address.transport_type()
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == ConnectionDirection::Outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_type_from_host() {
        assert_eq!(
            Address::new("abcdef.onion", 9999).transport_type(),
            TransportType::Tor
        );
        assert_eq!(
            Address::new("abcdef.b32.i2p", 9999).transport_type(),
            TransportType::I2p
        );
        assert_eq!(Address::localhost(8000).transport_type(), TransportType::Clear);
    }

    #[test]
    fn test_address_parse_roundtrip() {
        let address: Address = "10.0.0.1:8000".parse().unwrap();
        assert_eq!(address.host(), "10.0.0.1");
        assert_eq!(address.port(), 8000);
        assert_eq!(address.to_string(), "10.0.0.1:8000");
    }

    #[test]
    fn test_address_parse_rejects_garbage() {
        assert!("no-port".parse::<Address>().is_err());
        assert!("host:notaport".parse::<Address>().is_err());
        assert!(":8000".parse::<Address>().is_err());
        assert!("host:0".parse::<Address>().is_err());
    }

    #[test]
    fn test_data_hash_length_bounds() {
        assert!(DataHash::from_slice(&[0u8; 19]).is_err());
        assert!(DataHash::from_slice(&[0u8; 20]).is_ok());
        assert!(DataHash::from_slice(&[0u8; 32]).is_ok());
        assert!(DataHash::from_slice(&[0u8; 33]).is_err());
    }

    #[test]
    fn test_data_hash_equality_by_value() {
        let a = DataHash::from_digest([7u8; 32]);
        let b = DataHash::from_slice(&[7u8; 32]).unwrap();
        assert_eq!(a, b);
    }
}
