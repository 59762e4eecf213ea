//! Outcome of a storage operation.
//!
//! Rejections here are expected under normal gossip and are values, not errors.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataStorageResult {
    Accepted,
    PayloadAlreadyStored,
    MaxMapSizeReached,
    RequestAlreadyReceived,
    SequenceNrInvalid,
    Expired,
    DataInvalid,
    NotAuthorized,
    PublicKeyHashInvalid,
    SignatureInvalid,
    NoEntry,
    AlreadyRemoved,
}

impl DataStorageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DataStorageResult::Accepted)
    }

    /// Sender misbehaved, as opposed to ordinary gossip redundancy.
    pub fn is_adversarial(&self) -> bool {
        matches!(
            self,
            DataStorageResult::DataInvalid
                | DataStorageResult::NotAuthorized
                | DataStorageResult::PublicKeyHashInvalid
                | DataStorageResult::SignatureInvalid
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataStorageResult::Accepted => "accepted",
            DataStorageResult::PayloadAlreadyStored => "payload_already_stored",
            DataStorageResult::MaxMapSizeReached => "max_map_size_reached",
            DataStorageResult::RequestAlreadyReceived => "request_already_received",
            DataStorageResult::SequenceNrInvalid => "sequence_nr_invalid",
            DataStorageResult::Expired => "expired",
            DataStorageResult::DataInvalid => "data_invalid",
            DataStorageResult::NotAuthorized => "not_authorized",
            DataStorageResult::PublicKeyHashInvalid => "public_key_hash_invalid",
            DataStorageResult::SignatureInvalid => "signature_invalid",
            DataStorageResult::NoEntry => "no_entry",
            DataStorageResult::AlreadyRemoved => "already_removed",
        }
    }
}

impl fmt::Display for DataStorageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
