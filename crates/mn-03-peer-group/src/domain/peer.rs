//! Peer records.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use shared_types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub address: Address,
    /// We dialed this peer when it was last connected.
    pub is_outbound: bool,
    /// Unix millis when the peer was last seen alive.
    pub created: u64,
}

impl Peer {
    pub fn new(address: Address, is_outbound: bool, created: u64) -> Self {
        Self {
            address,
            is_outbound,
            created,
        }
    }

    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created)
    }

    pub fn is_outdated(&self, now: u64, max_age_ms: u64) -> bool {
        self.age(now) >= max_age_ms
    }
}

/// Newest first, ties broken by address.
pub fn newest_first(a: &Peer, b: &Peer) -> Ordering {
    b.created
        .cmp(&a.created)
        .then_with(|| a.address.cmp(&b.address))
}
