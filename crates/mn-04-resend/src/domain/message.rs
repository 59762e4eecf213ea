//! Pending confidential messages.

use serde::{Deserialize, Serialize};
use shared_crypto::Ed25519KeyPair;
use shared_types::{Address, MessageDeliveryStatus, NetworkId};

/// An outbound confidential message whose delivery is not settled yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendMessageData {
    pub message_id: String,
    /// Encoded message, opaque to the tracker.
    pub payload: Vec<u8>,
    pub receiver_address: Address,
    pub receiver_public_key: Vec<u8>,
    /// Seed of the sender's signing key.
    sender_key_seed: [u8; 32],
    pub sender_network_id: NetworkId,
    pub status: MessageDeliveryStatus,
    /// Unix millis of the first send attempt.
    pub created: u64,
}

impl ResendMessageData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_id: impl Into<String>,
        payload: Vec<u8>,
        receiver_address: Address,
        receiver_public_key: Vec<u8>,
        sender_key_pair: &Ed25519KeyPair,
        sender_network_id: NetworkId,
        status: MessageDeliveryStatus,
        created: u64,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            payload,
            receiver_address,
            receiver_public_key,
            sender_key_seed: sender_key_pair.to_seed(),
            sender_network_id,
            status,
            created,
        }
    }

    pub fn sender_key_pair(&self) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed(self.sender_key_seed)
    }

    pub fn with_status(&self, status: MessageDeliveryStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn is_expired(&self, now: u64, max_age_ms: u64) -> bool {
        now.saturating_sub(self.created) > max_age_ms
    }
}
