//! # Data Requests
//!
//! Envelopes carrying distributed data on the wire and in the stores.
//!
//! | Request | Store value | Signed by |
//! |---------|-------------|-----------|
//! | `AddAppendOnlyDataRequest` | append-only | nobody |
//! | `AddAuthenticatedDataRequest` | authenticated | owner key |
//! | `RemoveAuthenticatedDataRequest` | authenticated (marker) | owner key |
//! | `RefreshAuthenticatedDataRequest` | never stored | owner key |

use serde::{Deserialize, Serialize};
use shared_crypto::{verify_detached, Ed25519KeyPair};
use shared_types::DataHash;

use super::data::{canonical_bytes, key_hash, DataFamily, DataPayload, DistributedData, DistributedDataExt};
use super::meta_data::MetaData;

// =============================================================================
// APPEND-ONLY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddAppendOnlyDataRequest {
    pub append_only_data: DataPayload,
}

impl AddAppendOnlyDataRequest {
    pub fn new(append_only_data: DataPayload) -> Self {
        Self { append_only_data }
    }

    /// Store key: hash of the data's canonical bytes.
    pub fn hash(&self) -> DataHash {
        DistributedData::AppendOnly(self.append_only_data.clone()).content_hash()
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.append_only_data.meta_data
    }
}

// =============================================================================
// AUTHENTICATED
// =============================================================================

/// Authenticated data with the fields the owner signs over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedSequentialData {
    /// `Authenticated` or `Authorized` variant.
    pub data: DistributedData,
    pub sequence_number: u32,
    /// Hash of the owner's public key.
    pub pub_key_hash: DataHash,
    /// Unix millis.
    pub created: u64,
}

impl AuthenticatedSequentialData {
    pub fn new(data: DistributedData, sequence_number: u32, pub_key_hash: DataHash, created: u64) -> Self {
        Self {
            data,
            sequence_number,
            pub_key_hash,
            created,
        }
    }

    /// Same data with a bumped sequence number and a fresh timestamp.
    pub fn refreshed(&self, sequence_number: u32, now: u64) -> Self {
        Self {
            sequence_number,
            created: now,
            ..self.clone()
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created) > self.data.meta_data().ttl_ms()
    }

    /// A new sequence number must be strictly greater than the stored one.
    pub fn is_sequence_nr_invalid(&self, seq_from_map: u32) -> bool {
        self.sequence_number <= seq_from_map
    }

    pub fn signing_bytes(&self) -> Vec<u8> {
        canonical_bytes(self)
    }
}

/// Latest accepted refresh of an add entry. Carries the owner's refresh
/// signature so peers receiving the entry through inventory can verify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshStamp {
    pub sequence_number: u32,
    pub signature: Vec<u8>,
    pub refreshed_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddAuthenticatedDataRequest {
    pub sequential_data: AuthenticatedSequentialData,
    pub signature: Vec<u8>,
    pub owner_public_key: Vec<u8>,
    /// Not covered by `signature`, verified on its own.
    pub refresh: Option<RefreshStamp>,
}

impl AddAuthenticatedDataRequest {
    /// Build and sign an add request for `data` owned by `owner`.
    pub fn create(data: DistributedData, sequence_number: u32, created: u64, owner: &Ed25519KeyPair) -> Self {
        let owner_public_key = owner.public_key().as_bytes().to_vec();
        let sequential_data =
            AuthenticatedSequentialData::new(data, sequence_number, key_hash(&owner_public_key), created);
        let signature = owner.sign(&sequential_data.signing_bytes()).to_vec();
        Self {
            sequential_data,
            signature,
            owner_public_key,
            refresh: None,
        }
    }

    /// Same entry after an accepted refresh.
    pub fn refreshed(&self, refresh: &RefreshAuthenticatedDataRequest, now: u64) -> Self {
        Self {
            refresh: Some(RefreshStamp {
                sequence_number: refresh.sequence_number,
                signature: refresh.signature.clone(),
                refreshed_at: now,
            }),
            ..self.clone()
        }
    }

    pub fn data(&self) -> &DistributedData {
        &self.sequential_data.data
    }

    pub fn hash(&self) -> DataHash {
        self.sequential_data.data.content_hash()
    }

    /// Sequence number of the latest refresh, or of the add itself.
    pub fn sequence_number(&self) -> u32 {
        self.refresh
            .as_ref()
            .map_or(self.sequential_data.sequence_number, |r| r.sequence_number)
    }

    /// Time of the latest refresh, or creation time.
    pub fn created(&self) -> u64 {
        self.refresh
            .as_ref()
            .map_or(self.sequential_data.created, |r| r.refreshed_at.max(self.sequential_data.created))
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created()) > self.data().meta_data().ttl_ms()
    }

    /// Owner key does not hash to the declared owner hash.
    pub fn is_public_key_invalid(&self) -> bool {
        key_hash(&self.owner_public_key) != self.sequential_data.pub_key_hash
    }

    pub fn is_signature_invalid(&self) -> bool {
        if verify_detached(
            &self.owner_public_key,
            &self.sequential_data.signing_bytes(),
            &self.signature,
        )
        .is_err()
        {
            return true;
        }
        self.refresh.as_ref().is_some_and(|stamp| {
            stamp.sequence_number <= self.sequential_data.sequence_number
                || verify_detached(
                    &self.owner_public_key,
                    &owner_action_bytes(OwnerAction::Refresh, &self.hash(), stamp.sequence_number),
                    &stamp.signature,
                )
                .is_err()
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
enum OwnerAction {
    Remove,
    Refresh,
}

/// What the owner signs for a remove or refresh. The action tag keeps a
/// refresh signature from being replayed as a removal.
fn owner_action_bytes(action: OwnerAction, hash: &DataHash, sequence_number: u32) -> Vec<u8> {
    canonical_bytes(&(action, hash, sequence_number))
}

/// Removal of an authenticated entry. Also kept as a marker in the store so
/// a delayed add with an older sequence number cannot resurrect the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveAuthenticatedDataRequest {
    pub meta_data: MetaData,
    pub hash: DataHash,
    pub owner_public_key: Vec<u8>,
    pub sequence_number: u32,
    pub signature: Vec<u8>,
    pub created: u64,
}

impl RemoveAuthenticatedDataRequest {
    pub fn create(
        data: &DistributedData,
        sequence_number: u32,
        created: u64,
        owner: &Ed25519KeyPair,
    ) -> Self {
        let hash = data.content_hash();
        let signature = owner
            .sign(&owner_action_bytes(OwnerAction::Remove, &hash, sequence_number))
            .to_vec();
        Self {
            meta_data: data.meta_data().clone(),
            hash,
            owner_public_key: owner.public_key().as_bytes().to_vec(),
            sequence_number,
            signature,
            created,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created) > self.meta_data.ttl_ms()
    }

    pub fn is_sequence_nr_invalid(&self, seq_from_map: u32) -> bool {
        self.sequence_number <= seq_from_map
    }

    pub fn is_public_key_hash_invalid(&self, stored: &AuthenticatedSequentialData) -> bool {
        key_hash(&self.owner_public_key) != stored.pub_key_hash
    }

    pub fn is_signature_invalid(&self) -> bool {
        let message = owner_action_bytes(OwnerAction::Remove, &self.hash, self.sequence_number);
        verify_detached(&self.owner_public_key, &message, &self.signature).is_err()
    }
}

/// Extends the lifetime of an authenticated entry without resending it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshAuthenticatedDataRequest {
    pub meta_data: MetaData,
    pub hash: DataHash,
    pub owner_public_key: Vec<u8>,
    pub sequence_number: u32,
    pub signature: Vec<u8>,
}

impl RefreshAuthenticatedDataRequest {
    pub fn create(data: &DistributedData, sequence_number: u32, owner: &Ed25519KeyPair) -> Self {
        let hash = data.content_hash();
        let signature = owner
            .sign(&owner_action_bytes(OwnerAction::Refresh, &hash, sequence_number))
            .to_vec();
        Self {
            meta_data: data.meta_data().clone(),
            hash,
            owner_public_key: owner.public_key().as_bytes().to_vec(),
            sequence_number,
            signature,
        }
    }

    pub fn is_sequence_nr_invalid(&self, seq_from_map: u32) -> bool {
        self.sequence_number <= seq_from_map
    }

    pub fn is_public_key_invalid(&self, stored: &AuthenticatedSequentialData) -> bool {
        key_hash(&self.owner_public_key) != stored.pub_key_hash
    }

    pub fn is_signature_invalid(&self) -> bool {
        let message = owner_action_bytes(OwnerAction::Refresh, &self.hash, self.sequence_number);
        verify_detached(&self.owner_public_key, &message, &self.signature).is_err()
    }
}

/// Value type of authenticated stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthenticatedDataRequest {
    Add(AddAuthenticatedDataRequest),
    Remove(RemoveAuthenticatedDataRequest),
}

impl AuthenticatedDataRequest {
    pub fn sequence_number(&self) -> u32 {
        match self {
            AuthenticatedDataRequest::Add(r) => r.sequence_number(),
            AuthenticatedDataRequest::Remove(r) => r.sequence_number,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        match self {
            AuthenticatedDataRequest::Add(r) => r.is_expired(now),
            AuthenticatedDataRequest::Remove(r) => r.is_expired(now),
        }
    }

    pub fn created(&self) -> u64 {
        match self {
            AuthenticatedDataRequest::Add(r) => r.created(),
            AuthenticatedDataRequest::Remove(r) => r.created,
        }
    }

    pub fn meta_data(&self) -> &MetaData {
        match self {
            AuthenticatedDataRequest::Add(r) => r.data().meta_data(),
            AuthenticatedDataRequest::Remove(r) => &r.meta_data,
        }
    }
}

// =============================================================================
// ENVELOPES
// =============================================================================

/// Request that adds data to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AddDataRequest {
    AppendOnly(AddAppendOnlyDataRequest),
    Authenticated(AddAuthenticatedDataRequest),
}

impl AddDataRequest {
    pub fn data(&self) -> DistributedData {
        match self {
            AddDataRequest::AppendOnly(r) => DistributedData::AppendOnly(r.append_only_data.clone()),
            AddDataRequest::Authenticated(r) => r.data().clone(),
        }
    }

    pub fn meta_data(&self) -> &MetaData {
        match self {
            AddDataRequest::AppendOnly(r) => r.meta_data(),
            AddDataRequest::Authenticated(r) => r.data().meta_data(),
        }
    }

    pub fn cost_factor(&self) -> f64 {
        self.meta_data().cost_factor()
    }

    /// Append-only data never expires.
    pub fn is_expired(&self, now: u64) -> bool {
        match self {
            AddDataRequest::AppendOnly(_) => false,
            AddDataRequest::Authenticated(r) => r.is_expired(now),
        }
    }

    /// Always 0 for append-only data.
    pub fn created(&self) -> u64 {
        match self {
            AddDataRequest::AppendOnly(_) => 0,
            AddDataRequest::Authenticated(r) => r.created(),
        }
    }

    pub fn max_map_size(&self) -> usize {
        self.meta_data().max_map_size()
    }
}

/// Every request that travels through gossip and inventories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataRequest {
    AddAppendOnly(AddAppendOnlyDataRequest),
    AddAuthenticated(AddAuthenticatedDataRequest),
    RemoveAuthenticated(RemoveAuthenticatedDataRequest),
    RefreshAuthenticated(RefreshAuthenticatedDataRequest),
}

impl DataRequest {
    pub fn family(&self) -> DataFamily {
        match self {
            DataRequest::AddAppendOnly(_) => DataFamily::AppendOnly,
            _ => DataFamily::Authenticated,
        }
    }

    pub fn meta_data(&self) -> &MetaData {
        match self {
            DataRequest::AddAppendOnly(r) => r.meta_data(),
            DataRequest::AddAuthenticated(r) => r.data().meta_data(),
            DataRequest::RemoveAuthenticated(r) => &r.meta_data,
            DataRequest::RefreshAuthenticated(r) => &r.meta_data,
        }
    }

    pub fn store_name(&self) -> &str {
        self.meta_data().store_name()
    }

    /// Key of the entry this request targets.
    pub fn hash(&self) -> DataHash {
        match self {
            DataRequest::AddAppendOnly(r) => r.hash(),
            DataRequest::AddAuthenticated(r) => r.hash(),
            DataRequest::RemoveAuthenticated(r) => r.hash.clone(),
            DataRequest::RefreshAuthenticated(r) => r.hash.clone(),
        }
    }

    /// 0 for append-only data.
    pub fn sequence_number(&self) -> u32 {
        match self {
            DataRequest::AddAppendOnly(_) => 0,
            DataRequest::AddAuthenticated(r) => r.sequence_number(),
            DataRequest::RemoveAuthenticated(r) => r.sequence_number,
            DataRequest::RefreshAuthenticated(r) => r.sequence_number,
        }
    }

    /// Wire size, used for inventory budgets.
    pub fn serialized_size(&self) -> usize {
        bincode::serialized_size(self).map(|s| s as usize).unwrap_or(0)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataRequest::AddAppendOnly(_) => "AddAppendOnlyDataRequest",
            DataRequest::AddAuthenticated(_) => "AddAuthenticatedDataRequest",
            DataRequest::RemoveAuthenticated(_) => "RemoveAuthenticatedDataRequest",
            DataRequest::RefreshAuthenticated(_) => "RefreshAuthenticatedDataRequest",
        }
    }
}

impl From<AddDataRequest> for DataRequest {
    fn from(request: AddDataRequest) -> Self {
        match request {
            AddDataRequest::AppendOnly(r) => DataRequest::AddAppendOnly(r),
            AddDataRequest::Authenticated(r) => DataRequest::AddAuthenticated(r),
        }
    }
}

impl From<AuthenticatedDataRequest> for DataRequest {
    fn from(request: AuthenticatedDataRequest) -> Self {
        match request {
            AuthenticatedDataRequest::Add(r) => DataRequest::AddAuthenticated(r),
            AuthenticatedDataRequest::Remove(r) => DataRequest::RemoveAuthenticated(r),
        }
    }
}
