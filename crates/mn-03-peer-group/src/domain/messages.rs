//! Peer exchange wire messages.

use serde::{Deserialize, Serialize};

use super::peer::Peer;

/// Upper bound on peers carried by one exchange message.
pub const MAX_EXCHANGED_PEERS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerExchangeRequest {
    pub nonce: u32,
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerExchangeResponse {
    pub request_nonce: u32,
    pub peers: Vec<Peer>,
}

impl PeerExchangeRequest {
    pub fn new(nonce: u32, mut peers: Vec<Peer>) -> Self {
        peers.truncate(MAX_EXCHANGED_PEERS);
        Self { nonce, peers }
    }

    pub fn is_valid(&self) -> bool {
        self.peers.len() <= MAX_EXCHANGED_PEERS
    }
}

impl PeerExchangeResponse {
    pub fn new(request_nonce: u32, mut peers: Vec<Peer>) -> Self {
        peers.truncate(MAX_EXCHANGED_PEERS);
        Self {
            request_nonce,
            peers,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.peers.len() <= MAX_EXCHANGED_PEERS
    }
}
