//! Storage events fanned out to listeners through the shared bus.

use shared_bus::BusEvent;

use super::data::DistributedData;
use super::requests::DataRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTopic {
    Added,
    Removed,
    Refreshed,
}

#[derive(Debug, Clone)]
pub enum StorageEvent {
    /// New data accepted. `request` is what gets re-gossiped.
    Added {
        data: DistributedData,
        request: DataRequest,
    },
    /// Data removed by its owner or pruned on expiry. `request` is `None`
    /// for local pruning, which is never gossiped.
    Removed {
        data: DistributedData,
        request: Option<DataRequest>,
    },
    Refreshed {
        data: DistributedData,
        request: DataRequest,
    },
}

impl StorageEvent {
    pub fn data(&self) -> &DistributedData {
        match self {
            StorageEvent::Added { data, .. }
            | StorageEvent::Removed { data, .. }
            | StorageEvent::Refreshed { data, .. } => data,
        }
    }

    /// Request to forward to other peers, if any.
    pub fn gossip_request(&self) -> Option<&DataRequest> {
        match self {
            StorageEvent::Added { request, .. } | StorageEvent::Refreshed { request, .. } => {
                Some(request)
            }
            StorageEvent::Removed { request, .. } => request.as_ref(),
        }
    }
}

impl BusEvent for StorageEvent {
    type Topic = StorageTopic;

    fn topic(&self) -> StorageTopic {
        match self {
            StorageEvent::Added { .. } => StorageTopic::Added,
            StorageEvent::Removed { .. } => StorageTopic::Removed,
            StorageEvent::Refreshed { .. } => StorageTopic::Refreshed,
        }
    }
}
