//! # Data Filter
//!
//! Summary of what a requester already holds. The responder sends back every
//! stored request the filter does not cover.
//!
//! | Encoding | Size | Accuracy |
//! |----------|------|----------|
//! | `Entries` (default) | 20-32 bytes + 4 per entry | exact |
//! | `Bloom` | ~10 bits per entry at 1% | may withhold ~1% of missing entries |

use std::collections::HashMap;

use mn_01_data_storage::{DataFamily, DataRequest};
use serde::{Deserialize, Serialize};
use shared_types::DataHash;

use super::bloom::BloomSummary;

/// A stored entry as the requester knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterEntry {
    pub hash: DataHash,
    /// 0 for append-only data.
    pub sequence_number: u32,
}

impl FilterEntry {
    pub fn of(request: &DataRequest) -> Self {
        Self {
            hash: request.hash(),
            sequence_number: request.sequence_number(),
        }
    }

    fn bloom_key(hash: &DataHash, sequence_number: u32) -> Vec<u8> {
        let mut key = hash.as_bytes().to_vec();
        key.extend_from_slice(&sequence_number.to_le_bytes());
        key
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataFilter {
    Entries(Vec<FilterEntry>),
    Bloom(BloomSummary),
}

impl Default for DataFilter {
    fn default() -> Self {
        DataFilter::Entries(Vec::new())
    }
}

impl DataFilter {
    /// Upper bound on entries a filter describes.
    pub const MAX_ENTRIES: usize = 100_000;

    /// Filter matching nothing: the responder sends everything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Exact filter over `entries`, truncated to [`DataFilter::MAX_ENTRIES`].
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DataRequest>) -> Self {
        DataFilter::Entries(
            entries
                .into_iter()
                .take(Self::MAX_ENTRIES)
                .map(FilterEntry::of)
                .collect(),
        )
    }

    pub fn bloom(entries: &[DataRequest], fpr: f64, tweak: u32) -> Self {
        let included = &entries[..entries.len().min(Self::MAX_ENTRIES)];
        let mut summary = BloomSummary::with_capacity(included.len(), fpr, tweak);
        for request in included {
            summary.insert(&FilterEntry::bloom_key(&request.hash(), request.sequence_number()));
        }
        DataFilter::Bloom(summary)
    }

    pub fn len(&self) -> usize {
        match self {
            DataFilter::Entries(entries) => entries.len(),
            DataFilter::Bloom(summary) => summary.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Structural check applied to filters received from peers.
    pub fn is_valid(&self) -> bool {
        match self {
            DataFilter::Entries(entries) => {
                entries.len() <= Self::MAX_ENTRIES && entries.iter().all(|e| e.hash.is_valid())
            }
            DataFilter::Bloom(summary) => summary.is_valid() && summary.len() <= Self::MAX_ENTRIES,
        }
    }

    /// Prepare the filter for many lookups.
    pub fn matcher(&self) -> FilterMatcher<'_> {
        match self {
            DataFilter::Entries(entries) => FilterMatcher::Index(
                entries
                    .iter()
                    .map(|e| (e.hash.clone(), e.sequence_number))
                    .collect(),
            ),
            DataFilter::Bloom(summary) => FilterMatcher::Bloom(summary),
        }
    }
}

pub enum FilterMatcher<'a> {
    Index(HashMap<DataHash, u32>),
    Bloom(&'a BloomSummary),
}

impl FilterMatcher<'_> {
    /// The requester lacks `request`: append-only data whose hash it does not
    /// know, or authenticated data it knows only with a lower sequence number.
    pub fn is_missing(&self, request: &DataRequest) -> bool {
        let hash = request.hash();
        let sequence_number = request.sequence_number();
        match self {
            FilterMatcher::Index(index) => match (request.family(), index.get(&hash)) {
                (_, None) => true,
                (DataFamily::AppendOnly, Some(_)) => false,
                (DataFamily::Authenticated, Some(known)) => sequence_number > *known,
            },
            FilterMatcher::Bloom(summary) => {
                !summary.contains(&FilterEntry::bloom_key(&hash, sequence_number))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mn_01_data_storage::{
        AddAppendOnlyDataRequest, AddAuthenticatedDataRequest, DataPayload, DistributedData, MetaData, DAY_MS,
    };
    use shared_crypto::Ed25519KeyPair;

    fn witness(content: &[u8]) -> DataRequest {
        DataRequest::AddAppendOnly(AddAppendOnlyDataRequest::new(DataPayload::new(
            "Witness",
            MetaData::new("Witness", 0),
            content.to_vec(),
        )))
    }

    fn offer(owner: &Ed25519KeyPair, seq: u32) -> DataRequest {
        let data = DistributedData::Authenticated(DataPayload::new(
            "Offer",
            MetaData::new("Offer", DAY_MS),
            b"offer".to_vec(),
        ));
        DataRequest::AddAuthenticated(AddAuthenticatedDataRequest::create(data, seq, 0, owner))
    }

    #[test]
    fn test_empty_filter_misses_everything() {
        let filter = DataFilter::empty();
        let matcher = filter.matcher();
        assert!(matcher.is_missing(&witness(b"a")));
    }

    #[test]
    fn test_known_append_only_not_missing() {
        let known = witness(b"a");
        let filter = DataFilter::from_entries([&known]);
        let matcher = filter.matcher();
        assert!(!matcher.is_missing(&known));
        assert!(matcher.is_missing(&witness(b"b")));
    }

    #[test]
    fn test_newer_sequence_number_is_missing() {
        let owner = Ed25519KeyPair::generate();
        let filter = DataFilter::from_entries([&offer(&owner, 1)]);
        let matcher = filter.matcher();
        assert!(!matcher.is_missing(&offer(&owner, 1)));
        assert!(matcher.is_missing(&offer(&owner, 2)));
    }

    #[test]
    fn test_bloom_filter_covers_inserted() {
        let entries: Vec<_> = (0..50u8).map(|i| witness(&[i])).collect();
        let filter = DataFilter::bloom(&entries, 0.001, 3);
        assert!(filter.is_valid());
        let matcher = filter.matcher();
        assert!(entries.iter().all(|e| !matcher.is_missing(e)));
    }

    #[test]
    fn test_short_hash_from_wire_rejected() {
        let short: DataHash = bincode::deserialize(&bincode::serialize(&vec![1u8; 5]).unwrap()).unwrap();
        let filter = DataFilter::Entries(vec![FilterEntry {
            hash: short,
            sequence_number: 0,
        }]);
        assert!(!filter.is_valid());
    }
}
