//! Content-addressed map persisted as one snapshot per store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::DataHash;

/// Map from content hash to the stored request.
///
/// Keys are unique; callers never overwrite an add entry with an identical one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStore<R> {
    map: BTreeMap<DataHash, R>,
}

impl<R> Default for DataStore<R> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<R> DataStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, hash: &DataHash) -> Option<&R> {
        self.map.get(hash)
    }

    pub fn contains(&self, hash: &DataHash) -> bool {
        self.map.contains_key(hash)
    }

    /// Insert only when absent. Returns `false` for an existing key.
    pub fn insert_new(&mut self, hash: DataHash, value: R) -> bool {
        match self.map.entry(hash) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Insert or replace. Used by authenticated stores for sequence updates.
    pub fn put(&mut self, hash: DataHash, value: R) -> Option<R> {
        self.map.insert(hash, value)
    }

    pub fn remove(&mut self, hash: &DataHash) -> Option<R> {
        self.map.remove(hash)
    }

    pub fn retain(&mut self, keep: impl FnMut(&DataHash, &mut R) -> bool) {
        self.map.retain(keep)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DataHash, &R)> {
        self.map.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.map.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DataHash> {
        self.map.keys()
    }
}

impl<R> FromIterator<(DataHash, R)> for DataStore<R> {
    fn from_iter<I: IntoIterator<Item = (DataHash, R)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_new_never_overwrites() {
        let mut store = DataStore::new();
        let hash = DataHash::from_digest([1; 32]);
        assert!(store.insert_new(hash.clone(), "first"));
        assert!(!store.insert_new(hash.clone(), "second"));
        assert_eq!(store.get(&hash), Some(&"first"));
        assert_eq!(store.len(), 1);
    }
}
