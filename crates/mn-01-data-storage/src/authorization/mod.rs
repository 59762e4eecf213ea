//! # Authorization Verifier
//!
//! Privileged data must be signed by a key that belongs to an authorized key
//! set. The set is either fixed at build time (static) or resolved from
//! other accepted network data (deferred, see [`BondedRoleRegistry`]).
//!
//! ## Verification Order
//!
//! 1. Payload structurally invalid → invalid
//! 2. Signature over the payload's canonical bytes fails → invalid
//! 3. Strategy dispatch: neither → warn + invalid; static only → set
//!    membership; deferred (with or without static) → deferred verdict is final
//!
//! Malformed key or signature bytes are reported as invalid, never propagated.

pub mod bonded_roles;

use std::collections::HashSet;
use std::sync::Arc;

use shared_crypto::verify_detached;
use shared_types::DataHash;
use tracing::{debug, warn};

use crate::domain::{AuthorizedData, AuthorizedKind, DistributedData, DistributedDataExt};

pub use bonded_roles::BondedRoleRegistry;

/// Source of truth for keys authorized through other network data.
pub trait DeferredAuthorizer: Send + Sync {
    fn is_authorized(&self, kind: &AuthorizedKind, signer_key_hash: &DataHash) -> bool;
}

/// Deferred source that authorizes nobody.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl DeferredAuthorizer for DenyAll {
    fn is_authorized(&self, _kind: &AuthorizedKind, _signer_key_hash: &DataHash) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Structure or signature broken.
    DataInvalid,
    /// Well-formed and signed, but by a key outside the authorized set.
    NotAuthorized,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

pub struct AuthorizationVerifier {
    static_key_hashes: HashSet<DataHash>,
    deferred: Arc<dyn DeferredAuthorizer>,
}

impl AuthorizationVerifier {
    pub fn new(
        static_key_hashes: impl IntoIterator<Item = DataHash>,
        deferred: Arc<dyn DeferredAuthorizer>,
    ) -> Self {
        Self {
            static_key_hashes: static_key_hashes.into_iter().collect(),
            deferred,
        }
    }

    /// Verifier with no static keys that rejects every deferred check.
    pub fn deny_all() -> Self {
        Self::new(Vec::new(), Arc::new(DenyAll))
    }

    pub fn static_key_count(&self) -> usize {
        self.static_key_hashes.len()
    }

    pub fn verify(&self, data: &AuthorizedData) -> Verdict {
        let payload = &data.payload;
        if !payload.is_structurally_valid() {
            debug!(kind = payload.kind.name(), "Authorized payload structurally invalid");
            return Verdict::DataInvalid;
        }

        if let Err(e) = verify_detached(
            &data.authorized_public_key,
            &payload.serialize_for_hash(),
            &data.signature,
        ) {
            debug!(kind = payload.kind.name(), error = %e, "Authorized data signature rejected");
            return Verdict::DataInvalid;
        }

        let signer = data.signer_key_hash();
        let strategy = payload.kind.strategy();
        let authorized = match (strategy.static_keys, strategy.deferred) {
            (false, false) => {
                warn!(
                    kind = payload.kind.name(),
                    "Authorized data type implements no authorization strategy"
                );
                return Verdict::DataInvalid;
            }
            (true, false) => self.static_key_hashes.contains(&signer),
            (_, true) => self.deferred.is_authorized(&payload.kind, &signer),
        };

        if authorized {
            Verdict::Valid
        } else {
            debug!(kind = payload.kind.name(), signer = %signer, "Signer not in authorized key set");
            Verdict::NotAuthorized
        }
    }

    /// Validity check applied by authenticated stores before accepting
    /// `data` for an owner. Authorized data must additionally be owned by
    /// the key that authorized it.
    pub fn is_data_invalid(&self, data: &DistributedData, owner_pub_key_hash: &DataHash) -> bool {
        self.check(data, owner_pub_key_hash) != Verdict::Valid
    }

    pub(crate) fn check(&self, data: &DistributedData, owner_pub_key_hash: &DataHash) -> Verdict {
        match data {
            DistributedData::Authorized(authorized) => {
                if &authorized.signer_key_hash() != owner_pub_key_hash {
                    return Verdict::DataInvalid;
                }
                self.verify(authorized)
            }
            other => {
                if other.is_structurally_valid() {
                    Verdict::Valid
                } else {
                    Verdict::DataInvalid
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        key_hash, AuthorizedPayload, BondedRoleRegistration, BondedRoleType, MetaData, DAY_MS,
    };
    use parking_lot::RwLock;
    use shared_crypto::Ed25519KeyPair;

    /// Deferred source backed by a mutable set.
    #[derive(Default)]
    struct SwitchableAuthorizer {
        keys: RwLock<HashSet<DataHash>>,
    }

    impl DeferredAuthorizer for SwitchableAuthorizer {
        fn is_authorized(&self, _kind: &AuthorizedKind, signer_key_hash: &DataHash) -> bool {
            self.keys.read().contains(signer_key_hash)
        }
    }

    fn oracle_registration(signer: &Ed25519KeyPair) -> AuthorizedData {
        let registration = BondedRoleRegistration {
            role: BondedRoleType::Oracle,
            public_key: Ed25519KeyPair::generate().public_key().as_bytes().to_vec(),
        };
        AuthorizedData::sign(
            AuthorizedPayload::new(
                AuthorizedKind::OracleNode,
                MetaData::new("OracleNode", DAY_MS),
                registration.to_bytes(),
            ),
            signer,
        )
    }

    fn alert(signer: &Ed25519KeyPair) -> AuthorizedData {
        AuthorizedData::sign(
            AuthorizedPayload::new(AuthorizedKind::Alert, MetaData::new("Alert", DAY_MS), b"halt".to_vec()),
            signer,
        )
    }

    // =========================================================================
    // TEST GROUP 1: Static Key Set
    // =========================================================================

    #[test]
    fn test_static_member_accepted() {
        let signer = Ed25519KeyPair::generate();
        let verifier = AuthorizationVerifier::new(
            vec![key_hash(signer.public_key().as_bytes())],
            Arc::new(DenyAll),
        );
        assert_eq!(verifier.verify(&oracle_registration(&signer)), Verdict::Valid);
    }

    #[test]
    fn test_static_non_member_rejected() {
        let trusted = Ed25519KeyPair::generate();
        let stranger = Ed25519KeyPair::generate();
        let verifier = AuthorizationVerifier::new(
            vec![key_hash(trusted.public_key().as_bytes())],
            Arc::new(DenyAll),
        );
        assert_eq!(verifier.verify(&oracle_registration(&stranger)), Verdict::NotAuthorized);
    }

    // =========================================================================
    // TEST GROUP 2: Tampering
    // =========================================================================

    #[test]
    fn test_any_flipped_signature_byte_invalidates() {
        let signer = Ed25519KeyPair::generate();
        let verifier = AuthorizationVerifier::new(
            vec![key_hash(signer.public_key().as_bytes())],
            Arc::new(DenyAll),
        );
        let data = oracle_registration(&signer);
        let owner = data.signer_key_hash();
        for i in 0..data.signature.len() {
            let mut tampered = data.clone();
            tampered.signature[i] ^= 0x01;
            let wrapped = DistributedData::Authorized(tampered);
            assert!(verifier.is_data_invalid(&wrapped, &owner), "byte {i}");
        }
    }

    #[test]
    fn test_flipped_content_byte_invalidates() {
        let signer = Ed25519KeyPair::generate();
        let verifier = AuthorizationVerifier::new(
            vec![key_hash(signer.public_key().as_bytes())],
            Arc::new(DenyAll),
        );
        let data = oracle_registration(&signer);
        let owner = data.signer_key_hash();
        let mut tampered = data.clone();
        let last = tampered.payload.content.len() - 1;
        tampered.payload.content[last] ^= 0xff;
        assert!(verifier.is_data_invalid(&DistributedData::Authorized(tampered), &owner));
    }

    #[test]
    fn test_malformed_key_bytes_are_invalid() {
        let signer = Ed25519KeyPair::generate();
        let verifier = AuthorizationVerifier::deny_all();
        let mut data = alert(&signer);
        data.authorized_public_key = vec![1, 2, 3];
        assert_eq!(verifier.verify(&data), Verdict::DataInvalid);
    }

    // =========================================================================
    // TEST GROUP 3: Strategy Dispatch
    // =========================================================================

    #[test]
    fn test_deferred_set_flips_verdict() {
        let signer = Ed25519KeyPair::generate();
        let deferred = Arc::new(SwitchableAuthorizer::default());
        let verifier = AuthorizationVerifier::new(Vec::new(), deferred.clone());
        let data = alert(&signer);

        assert_eq!(verifier.verify(&data), Verdict::NotAuthorized);
        deferred.keys.write().insert(data.signer_key_hash());
        assert_eq!(verifier.verify(&data), Verdict::Valid);
        deferred.keys.write().clear();
        assert_eq!(verifier.verify(&data), Verdict::NotAuthorized);
    }

    #[test]
    fn test_deferred_verdict_is_final_for_combined_strategy() {
        let signer = Ed25519KeyPair::generate();
        let registration = BondedRoleRegistration {
            role: BondedRoleType::Mediator,
            public_key: vec![9; 32],
        };
        let data = AuthorizedData::sign(
            AuthorizedPayload::new(
                AuthorizedKind::BondedRole,
                MetaData::new("BondedRole", DAY_MS),
                registration.to_bytes(),
            ),
            &signer,
        );
        // Signer is in the static set but the deferred source says no.
        let verifier = AuthorizationVerifier::new(
            vec![key_hash(signer.public_key().as_bytes())],
            Arc::new(DenyAll),
        );
        assert_eq!(verifier.verify(&data), Verdict::NotAuthorized);
    }

    #[test]
    fn test_no_strategy_is_invalid() {
        let signer = Ed25519KeyPair::generate();
        let data = AuthorizedData::sign(
            AuthorizedPayload::new(
                AuthorizedKind::Unclassified("Legacy".into()),
                MetaData::new("Legacy", DAY_MS),
                vec![1],
            ),
            &signer,
        );
        let verifier = AuthorizationVerifier::new(
            vec![key_hash(signer.public_key().as_bytes())],
            Arc::new(DenyAll),
        );
        assert_eq!(verifier.verify(&data), Verdict::DataInvalid);
    }

    #[test]
    fn test_owner_must_match_authorizer() {
        let signer = Ed25519KeyPair::generate();
        let verifier = AuthorizationVerifier::new(
            vec![key_hash(signer.public_key().as_bytes())],
            Arc::new(DenyAll),
        );
        let data = DistributedData::Authorized(oracle_registration(&signer));
        let other_owner = key_hash(b"someone else");
        assert!(verifier.is_data_invalid(&data, &other_owner));
    }
}
