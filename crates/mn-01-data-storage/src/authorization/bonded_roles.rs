//! Deferred authorization source fed by accepted bonded-role data.
//!
//! | Kind | Signer must be a registered |
//! |------|-----------------------------|
//! | `BondedRole` | Oracle |
//! | `MarketPrice` | Oracle |
//! | `Alert` | SecurityManager |
//!
//! `OracleNode` and `BondedRole` registrations entering or leaving the
//! authenticated stores add or remove the registered key. The stores apply
//! their own events while still inside the request, never through the bus.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use shared_types::DataHash;
use tracing::{debug, info};

use super::DeferredAuthorizer;
use crate::domain::{
    key_hash, AuthorizedKind, BondedRoleRegistration, BondedRoleType, DistributedData, StorageEvent,
};

#[derive(Debug, Default)]
pub struct BondedRoleRegistry {
    roles: RwLock<HashMap<BondedRoleType, HashSet<DataHash>>>,
}

impl BondedRoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_role(&self, role: BondedRoleType, key: &DataHash) -> bool {
        self.roles
            .read()
            .get(&role)
            .is_some_and(|keys| keys.contains(key))
    }

    pub fn keys(&self, role: BondedRoleType) -> usize {
        self.roles.read().get(&role).map_or(0, HashSet::len)
    }

    pub fn register(&self, registration: &BondedRoleRegistration) {
        let key = key_hash(&registration.public_key);
        let inserted = self
            .roles
            .write()
            .entry(registration.role)
            .or_default()
            .insert(key.clone());
        if inserted {
            info!(role = ?registration.role, key = %key, "Bonded role registered");
        }
    }

    pub fn unregister(&self, registration: &BondedRoleRegistration) {
        let key = key_hash(&registration.public_key);
        let removed = self
            .roles
            .write()
            .get_mut(&registration.role)
            .is_some_and(|keys| keys.remove(&key));
        if removed {
            info!(role = ?registration.role, key = %key, "Bonded role removed");
        }
    }

    /// Replace the whole registry with the registrations found in `data`.
    pub fn rebuild<'a>(&self, data: impl IntoIterator<Item = &'a DistributedData>) {
        let mut roles: HashMap<BondedRoleType, HashSet<DataHash>> = HashMap::new();
        for registration in data.into_iter().filter_map(registration_of) {
            roles
                .entry(registration.role)
                .or_default()
                .insert(key_hash(&registration.public_key));
        }
        debug!(roles = roles.len(), "Bonded role registry rebuilt");
        *self.roles.write() = roles;
    }

    pub fn apply(&self, event: &StorageEvent) {
        let Some(registration) = registration_of(event.data()) else {
            return;
        };
        match event {
            StorageEvent::Added { .. } | StorageEvent::Refreshed { .. } => self.register(&registration),
            StorageEvent::Removed { .. } => self.unregister(&registration),
        }
    }
}

fn registration_of(data: &DistributedData) -> Option<BondedRoleRegistration> {
    data.as_authorized().and_then(|a| a.payload.registration())
}

impl DeferredAuthorizer for BondedRoleRegistry {
    fn is_authorized(&self, kind: &AuthorizedKind, signer_key_hash: &DataHash) -> bool {
        match kind {
            AuthorizedKind::BondedRole | AuthorizedKind::MarketPrice => {
                self.has_role(BondedRoleType::Oracle, signer_key_hash)
            }
            AuthorizedKind::Alert => self.has_role(BondedRoleType::SecurityManager, signer_key_hash),
            AuthorizedKind::OracleNode | AuthorizedKind::Unclassified(_) => false,
        }
    }
}
