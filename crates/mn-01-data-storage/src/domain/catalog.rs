//! # Store Catalog
//!
//! The set of stores a node hosts and the storage parameters each one is
//! pinned to. A request is only routed to a store whose catalog entry has the
//! request's family and the exact same [`MetaData`]; anything else is invalid
//! data. Store names double as file names, so only catalog names ever reach
//! the persistence layer.

use std::collections::BTreeMap;

use tracing::warn;

use super::data::DataFamily;
use super::meta_data::{MetaData, DAY_MS};

pub const MAX_STORE_NAME_LEN: usize = 64;

/// ASCII letters, digits, `-` and `_`, at most [`MAX_STORE_NAME_LEN`] bytes.
pub fn is_valid_store_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_STORE_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub family: DataFamily,
    pub meta_data: MetaData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreCatalog {
    stores: BTreeMap<String, CatalogEntry>,
}

impl StoreCatalog {
    /// Catalog without any store.
    pub fn empty() -> Self {
        Self {
            stores: BTreeMap::new(),
        }
    }

    /// Add or replace the store named by `meta_data`. Invalid names are skipped.
    pub fn with(mut self, family: DataFamily, meta_data: MetaData) -> Self {
        let name = meta_data.store_name().to_string();
        if !is_valid_store_name(&name) {
            warn!(store = %name, "Ignoring catalog entry with invalid store name");
            return self;
        }
        self.stores.insert(name, CatalogEntry { family, meta_data });
        self
    }

    pub fn get(&self, store_name: &str) -> Option<&CatalogEntry> {
        self.stores.get(store_name)
    }

    /// Pinned parameters of `store_name` if it hosts `family`.
    pub fn meta_data(&self, family: DataFamily, store_name: &str) -> Option<&MetaData> {
        self.get(store_name)
            .filter(|entry| entry.family == family)
            .map(|entry| &entry.meta_data)
    }

    /// Pinned parameters for a request carrying `claimed`, if the claim
    /// matches the catalog exactly.
    pub fn resolve(&self, family: DataFamily, claimed: &MetaData) -> Option<&MetaData> {
        self.meta_data(family, claimed.store_name())
            .filter(|pinned| *pinned == claimed)
    }

    pub fn store_names(&self, family: DataFamily) -> impl Iterator<Item = &str> {
        self.stores
            .iter()
            .filter(move |(_, entry)| entry.family == family)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl Default for StoreCatalog {
    /// The stores every node of the network hosts.
    fn default() -> Self {
        Self::empty()
            .with(DataFamily::AppendOnly, MetaData::new("Witness", 0))
            .with(DataFamily::Authenticated, MetaData::new("Offer", DAY_MS))
            .with(DataFamily::Authenticated, MetaData::new("OracleNode", DAY_MS))
            .with(DataFamily::Authenticated, MetaData::new("BondedRole", DAY_MS))
            .with(DataFamily::Authenticated, MetaData::new("Alert", DAY_MS))
            .with(DataFamily::Authenticated, MetaData::new("MarketPrice", DAY_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_charset() {
        assert!(is_valid_store_name("Witness"));
        assert!(is_valid_store_name("market_price-v2"));
        assert!(!is_valid_store_name(""));
        assert!(!is_valid_store_name("../../../../escaped"));
        assert!(!is_valid_store_name("a/b"));
        assert!(!is_valid_store_name("dot.name"));
        assert!(!is_valid_store_name(&"x".repeat(MAX_STORE_NAME_LEN + 1)));
    }

    #[test]
    fn test_invalid_names_never_enter_catalog() {
        let catalog = StoreCatalog::empty()
            .with(DataFamily::AppendOnly, MetaData::new("../escaped", 0))
            .with(DataFamily::AppendOnly, MetaData::new("Witness", 0));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("../escaped").is_none());
    }

    #[test]
    fn test_resolve_requires_family_and_exact_parameters() {
        let catalog = StoreCatalog::default();
        let witness = MetaData::new("Witness", 0);

        assert_eq!(catalog.resolve(DataFamily::AppendOnly, &witness), Some(&witness));
        assert!(catalog.resolve(DataFamily::Authenticated, &witness).is_none());
        assert!(catalog
            .resolve(DataFamily::AppendOnly, &witness.clone().with_max_map_size(1_000_000))
            .is_none());
        assert!(catalog
            .resolve(DataFamily::AppendOnly, &MetaData::new("Unknown", 0))
            .is_none());
        assert!(catalog
            .resolve(DataFamily::Authenticated, &MetaData::new("Offer", DAY_MS * 365))
            .is_none());
    }

    #[test]
    fn test_default_catalog_families() {
        let catalog = StoreCatalog::default();
        assert_eq!(catalog.store_names(DataFamily::AppendOnly).collect::<Vec<_>>(), vec!["Witness"]);
        assert_eq!(catalog.store_names(DataFamily::Authenticated).count(), 5);
    }
}
