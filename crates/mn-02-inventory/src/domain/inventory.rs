//! # Inventory
//!
//! The responder's answer: stored requests the requester is missing, in
//! priority order, cut off at a byte budget.
//!
//! ## Order
//!
//! 1. Authenticated adds, highest `priority` first
//! 2. Removals
//! 3. Append-only data
//!
//! Once the budget is exceeded every further entry is withheld and counted
//! in `num_dropped`. Callers must assume an inventory may be partial.

use mn_01_data_storage::DataRequest;
use serde::{Deserialize, Serialize};

use super::filter::DataFilter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub entries: Vec<DataRequest>,
    pub num_dropped: usize,
}

impl Inventory {
    /// Select from `candidates` what `filter` lacks, within `max_size_bytes`.
    pub fn build(candidates: Vec<DataRequest>, filter: &DataFilter, max_size_bytes: usize) -> Self {
        let matcher = filter.matcher();
        let mut missing: Vec<DataRequest> = candidates
            .into_iter()
            .filter(|request| matcher.is_missing(request))
            .collect();
        missing.sort_by_key(|request| order_key(request));

        let total = missing.len();
        let mut size = 0usize;
        let mut entries = Vec::new();
        for request in missing {
            size += request.serialized_size();
            if size > max_size_bytes {
                break;
            }
            entries.push(request);
        }
        Self {
            num_dropped: total - entries.len(),
            entries,
        }
    }

    /// Some entries were withheld by the size budget.
    pub fn max_size_reached(&self) -> bool {
        self.num_dropped > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sort key: group first, then descending priority for authenticated adds.
fn order_key(request: &DataRequest) -> (u8, i64) {
    match request {
        DataRequest::AddAuthenticated(_) => (0, -i64::from(request.meta_data().priority())),
        DataRequest::RemoveAuthenticated(_) | DataRequest::RefreshAuthenticated(_) => (1, 0),
        DataRequest::AddAppendOnly(_) => (2, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mn_01_data_storage::{
        AddAppendOnlyDataRequest, AddAuthenticatedDataRequest, DataPayload, DistributedData, MetaData,
        RemoveAuthenticatedDataRequest, DAY_MS,
    };
    use shared_crypto::Ed25519KeyPair;

    fn witness(content: &[u8]) -> DataRequest {
        DataRequest::AddAppendOnly(AddAppendOnlyDataRequest::new(DataPayload::new(
            "Witness",
            MetaData::new("Witness", 0),
            content.to_vec(),
        )))
    }

    fn offer(owner: &Ed25519KeyPair, content: &[u8], priority: i32) -> AddAuthenticatedDataRequest {
        let data = DistributedData::Authenticated(DataPayload::new(
            "Offer",
            MetaData::new("Offer", DAY_MS).with_priority(priority),
            content.to_vec(),
        ));
        AddAuthenticatedDataRequest::create(data, 1, 0, owner)
    }

    #[test]
    fn test_ordering_by_group_and_priority() {
        let owner = Ed25519KeyPair::generate();
        let low = offer(&owner, b"low", 1);
        let high = offer(&owner, b"high", 9);
        let removal = RemoveAuthenticatedDataRequest::create(low.data(), 2, 0, &owner);
        let candidates = vec![
            witness(b"w"),
            DataRequest::RemoveAuthenticated(removal),
            DataRequest::AddAuthenticated(low),
            DataRequest::AddAuthenticated(high.clone()),
        ];

        let inventory = Inventory::build(candidates, &DataFilter::empty(), usize::MAX);
        let names: Vec<_> = inventory.entries.iter().map(DataRequest::name).collect();
        assert_eq!(
            names,
            vec![
                "AddAuthenticatedDataRequest",
                "AddAuthenticatedDataRequest",
                "RemoveAuthenticatedDataRequest",
                "AddAppendOnlyDataRequest"
            ]
        );
        assert_eq!(inventory.entries[0], DataRequest::AddAuthenticated(high));
        assert_eq!(inventory.num_dropped, 0);
    }

    #[test]
    fn test_budget_counts_dropped_entries() {
        let candidates: Vec<_> = (0..10u8).map(|i| witness(&[i; 64])).collect();
        let one = candidates[0].serialized_size();
        let inventory = Inventory::build(candidates, &DataFilter::empty(), one * 3 + one / 2);
        assert_eq!(inventory.len(), 3);
        assert_eq!(inventory.num_dropped, 7);
        assert!(inventory.max_size_reached());
    }

    #[test]
    fn test_filter_excludes_known_entries() {
        let a = witness(b"a");
        let b = witness(b"b");
        let filter = DataFilter::from_entries([&a]);
        let inventory = Inventory::build(vec![a, b.clone()], &filter, usize::MAX);
        assert_eq!(inventory.entries, vec![b]);
    }
}
