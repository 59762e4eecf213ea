//! # Distributed Data
//!
//! Shareable records come in three variants:
//!
//! - **AppendOnly**: immutable, never expires; identity is the hash of its bytes
//! - **Authenticated**: owned by a key, updated through sequence numbers, expires by TTL
//! - **Authorized**: authenticated data additionally signed by a key that must
//!   belong to an authorized key set

use serde::{Deserialize, Serialize};
use shared_crypto::sha256;
use shared_types::DataHash;

use super::catalog::is_valid_store_name;
use super::meta_data::MetaData;

/// Upper bound on opaque payload content.
pub const MAX_CONTENT_SIZE: usize = 200 * 1024;
const MAX_TYPE_NAME_LEN: usize = 100;

/// Capabilities every distributed data type provides.
pub trait DistributedDataExt {
    /// Canonical bytes the content hash and signatures are computed over.
    fn serialize_for_hash(&self) -> Vec<u8>;

    fn meta_data(&self) -> &MetaData;

    /// Field-level sanity checks, independent of any signature.
    fn is_structurally_valid(&self) -> bool;

    /// Content hash used as store key.
    fn content_hash(&self) -> DataHash {
        DataHash::from_digest(sha256(&self.serialize_for_hash()))
    }
}

/// Deterministic bincode encoding of plain data. Encoding these types cannot
/// fail, an empty vector is returned if it ever does.
pub(crate) fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    bincode::serialize(value).unwrap_or_default()
}

/// Opaque application payload tagged with its type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub type_name: String,
    pub meta_data: MetaData,
    pub content: Vec<u8>,
}

impl DataPayload {
    pub fn new(type_name: impl Into<String>, meta_data: MetaData, content: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            meta_data,
            content,
        }
    }
}

impl DistributedDataExt for DataPayload {
    fn serialize_for_hash(&self) -> Vec<u8> {
        canonical_bytes(self)
    }

    fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    fn is_structurally_valid(&self) -> bool {
        !self.type_name.is_empty()
            && self.type_name.len() <= MAX_TYPE_NAME_LEN
            && is_valid_store_name(self.meta_data.store_name())
            && self.meta_data.max_map_size() > 0
            && self.content.len() <= MAX_CONTENT_SIZE
    }
}

// =============================================================================
// AUTHORIZED DATA
// =============================================================================

/// Roles a key can be bonded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BondedRoleType {
    Oracle,
    SecurityManager,
    Mediator,
    Arbitrator,
    SeedNode,
}

/// Content of `OracleNode` and `BondedRole` payloads: the key being granted the role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondedRoleRegistration {
    pub role: BondedRoleType,
    pub public_key: Vec<u8>,
}

impl BondedRoleRegistration {
    pub fn to_bytes(&self) -> Vec<u8> {
        canonical_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bincode::deserialize(bytes).ok()
    }
}

/// Kind of an authorized payload, which fixes how its signer is authorized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizedKind {
    /// Oracle node registration, signed by a key of the static set.
    OracleNode,
    /// Bonded role registration, signed by a registered oracle node.
    BondedRole,
    /// Network alert, signed by a registered security manager.
    Alert,
    /// Market price feed, signed by a registered oracle node.
    MarketPrice,
    /// A type without any authorization strategy.
    Unclassified(String),
}

/// How a signer of a given kind is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationStrategy {
    pub static_keys: bool,
    pub deferred: bool,
}

impl AuthorizedKind {
    pub fn strategy(&self) -> AuthorizationStrategy {
        let (static_keys, deferred) = match self {
            AuthorizedKind::OracleNode => (true, false),
            AuthorizedKind::BondedRole => (true, true),
            AuthorizedKind::Alert | AuthorizedKind::MarketPrice => (false, true),
            AuthorizedKind::Unclassified(_) => (false, false),
        };
        AuthorizationStrategy {
            static_keys,
            deferred,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AuthorizedKind::OracleNode => "OracleNode",
            AuthorizedKind::BondedRole => "BondedRole",
            AuthorizedKind::Alert => "Alert",
            AuthorizedKind::MarketPrice => "MarketPrice",
            AuthorizedKind::Unclassified(name) => name,
        }
    }
}

/// The signed part of authorized data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedPayload {
    pub kind: AuthorizedKind,
    pub meta_data: MetaData,
    pub content: Vec<u8>,
}

impl AuthorizedPayload {
    pub fn new(kind: AuthorizedKind, meta_data: MetaData, content: Vec<u8>) -> Self {
        Self {
            kind,
            meta_data,
            content,
        }
    }

    pub fn registration(&self) -> Option<BondedRoleRegistration> {
        match self.kind {
            AuthorizedKind::OracleNode | AuthorizedKind::BondedRole => {
                BondedRoleRegistration::from_bytes(&self.content)
            }
            _ => None,
        }
    }
}

impl DistributedDataExt for AuthorizedPayload {
    fn serialize_for_hash(&self) -> Vec<u8> {
        canonical_bytes(self)
    }

    fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    fn is_structurally_valid(&self) -> bool {
        let registration_ok = match self.kind {
            AuthorizedKind::OracleNode => self
                .registration()
                .is_some_and(|r| r.role == BondedRoleType::Oracle),
            AuthorizedKind::BondedRole => self.registration().is_some(),
            _ => true,
        };
        registration_ok
            && self.kind.name().len() <= MAX_TYPE_NAME_LEN
            && is_valid_store_name(self.meta_data.store_name())
            && self.meta_data.max_map_size() > 0
            && self.content.len() <= MAX_CONTENT_SIZE
    }
}

/// Payload plus the detached signature of the authorizing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedData {
    pub payload: AuthorizedPayload,
    pub signature: Vec<u8>,
    pub authorized_public_key: Vec<u8>,
}

impl AuthorizedData {
    /// Sign `payload` with `signer`.
    pub fn sign(payload: AuthorizedPayload, signer: &shared_crypto::Ed25519KeyPair) -> Self {
        let signature = signer.sign(&payload.serialize_for_hash()).to_vec();
        Self {
            payload,
            signature,
            authorized_public_key: signer.public_key().as_bytes().to_vec(),
        }
    }

    pub fn signer_key_hash(&self) -> DataHash {
        key_hash(&self.authorized_public_key)
    }
}

/// Hash identifying a public key in key sets and ownership checks.
pub fn key_hash(public_key: &[u8]) -> DataHash {
    DataHash::from_short_digest(shared_crypto::hash160(public_key))
}

// =============================================================================
// CLOSED SUM TYPE
// =============================================================================

/// Storage family of a record, also the directory it is persisted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFamily {
    AppendOnly,
    Authenticated,
}

impl DataFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFamily::AppendOnly => "append_only",
            DataFamily::Authenticated => "authenticated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DistributedData {
    AppendOnly(DataPayload),
    Authenticated(DataPayload),
    Authorized(AuthorizedData),
}

impl DistributedData {
    pub fn family(&self) -> DataFamily {
        match self {
            DistributedData::AppendOnly(_) => DataFamily::AppendOnly,
            DistributedData::Authenticated(_) | DistributedData::Authorized(_) => {
                DataFamily::Authenticated
            }
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            DistributedData::AppendOnly(p) | DistributedData::Authenticated(p) => &p.type_name,
            DistributedData::Authorized(a) => a.payload.kind.name(),
        }
    }

    pub fn as_authorized(&self) -> Option<&AuthorizedData> {
        match self {
            DistributedData::Authorized(a) => Some(a),
            _ => None,
        }
    }
}

impl DistributedDataExt for DistributedData {
    fn serialize_for_hash(&self) -> Vec<u8> {
        canonical_bytes(self)
    }

    fn meta_data(&self) -> &MetaData {
        match self {
            DistributedData::AppendOnly(p) | DistributedData::Authenticated(p) => &p.meta_data,
            DistributedData::Authorized(a) => &a.payload.meta_data,
        }
    }

    fn is_structurally_valid(&self) -> bool {
        match self {
            DistributedData::AppendOnly(p) | DistributedData::Authenticated(p) => {
                p.is_structurally_valid()
            }
            DistributedData::Authorized(a) => a.payload.is_structurally_valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::meta_data::DAY_MS;

    fn payload(content: &[u8]) -> DataPayload {
        DataPayload::new("Witness", MetaData::new("Witness", 0), content.to_vec())
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = DistributedData::AppendOnly(payload(b"abc"));
        let b = DistributedData::AppendOnly(payload(b"abc"));
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 32);
    }

    #[test]
    fn test_content_hash_differs_by_variant() {
        let a = DistributedData::AppendOnly(payload(b"abc"));
        let b = DistributedData::Authenticated(payload(b"abc"));
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_structural_validity() {
        assert!(payload(b"x").is_structurally_valid());
        let mut oversized = payload(b"");
        oversized.content = vec![0u8; MAX_CONTENT_SIZE + 1];
        assert!(!oversized.is_structurally_valid());
        let unnamed = DataPayload::new("", MetaData::new("Witness", 0), vec![]);
        assert!(!unnamed.is_structurally_valid());
        let traversal = DataPayload::new("Witness", MetaData::new("../../escaped", 0), vec![]);
        assert!(!traversal.is_structurally_valid());
    }

    #[test]
    fn test_oracle_node_requires_oracle_registration() {
        let registration = BondedRoleRegistration {
            role: BondedRoleType::Mediator,
            public_key: vec![1; 32],
        };
        let payload = AuthorizedPayload::new(
            AuthorizedKind::OracleNode,
            MetaData::new("OracleNode", DAY_MS),
            registration.to_bytes(),
        );
        assert!(!payload.is_structurally_valid());
    }

    #[test]
    fn test_strategies() {
        assert_eq!(
            AuthorizedKind::BondedRole.strategy(),
            AuthorizationStrategy {
                static_keys: true,
                deferred: true
            }
        );
        let none = AuthorizedKind::Unclassified("Legacy".into()).strategy();
        assert!(!none.static_keys && !none.deferred);
    }
}
