//! In-memory ban list.

use std::collections::HashSet;

use parking_lot::RwLock;
use shared_types::Address;
use tracing::info;

use crate::ports::BanList;

#[derive(Debug, Default)]
pub struct InMemoryBanList {
    banned: RwLock<HashSet<Address>>,
}

impl InMemoryBanList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban(&self, address: Address) {
        info!(%address, "Banning peer");
        self.banned.write().insert(address);
    }

    pub fn unban(&self, address: &Address) -> bool {
        self.banned.write().remove(address)
    }

    pub fn len(&self) -> usize {
        self.banned.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BanList for InMemoryBanList {
    fn is_banned(&self, address: &Address) -> bool {
        self.banned.read().contains(address)
    }
}
