//! Store for append-only data.

use std::sync::Arc;

use shared_bus::{EventPublisher, InMemoryEventBus};
use tracing::debug;

use super::store_core::StoreCore;
use super::metrics::StorageMetrics;
use super::DataStorageService;
use crate::domain::{
    AddAppendOnlyDataRequest, DataFamily, DataRequest, DataStorageResult, DistributedData,
    DistributedDataExt, MetaData, StorageEvent,
};
use crate::ports::AppendOnlyPersistence;

pub struct AppendOnlyDataStorageService {
    core: StoreCore<AddAppendOnlyDataRequest>,
    meta_data: MetaData,
    events: Arc<InMemoryEventBus<StorageEvent>>,
    metrics: Arc<StorageMetrics>,
}

impl AppendOnlyDataStorageService {
    pub fn new(
        meta_data: MetaData,
        persistence: AppendOnlyPersistence,
        persist_interval: std::time::Duration,
        events: Arc<InMemoryEventBus<StorageEvent>>,
        metrics: Arc<StorageMetrics>,
    ) -> Self {
        Self {
            core: StoreCore::new(
                meta_data.store_name(),
                DataFamily::AppendOnly,
                persistence,
                persist_interval,
            ),
            meta_data,
            events,
            metrics,
        }
    }

    pub fn add(&self, request: AddAppendOnlyDataRequest) -> DataStorageResult {
        let result = self.try_insert(&request);
        self.metrics.record(result);

        if result.is_success() {
            self.core.request_persist();
            let data = DistributedData::AppendOnly(request.append_only_data.clone());
            debug!(store = %self.core.name(), "Append-only data added");
            self.events.publish(StorageEvent::Added {
                data,
                request: DataRequest::AddAppendOnly(request),
            });
        } else {
            debug!(store = %self.core.name(), result = %result, "Append-only data not added");
        }
        result
    }

    fn try_insert(&self, request: &AddAppendOnlyDataRequest) -> DataStorageResult {
        if !request.append_only_data.is_structurally_valid() {
            return DataStorageResult::DataInvalid;
        }
        let hash = request.hash();
        let mut store = self.core.lock();
        if store.len() >= self.meta_data.max_map_size() {
            return DataStorageResult::MaxMapSizeReached;
        }
        if store.insert_new(hash, request.clone()) {
            DataStorageResult::Accepted
        } else {
            DataStorageResult::PayloadAlreadyStored
        }
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    pub fn contains(&self, request: &AddAppendOnlyDataRequest) -> bool {
        self.core.lock().contains(&request.hash())
    }
}

impl DataStorageService for AppendOnlyDataStorageService {
    type Request = AddAppendOnlyDataRequest;

    fn core(&self) -> &StoreCore<AddAppendOnlyDataRequest> {
        &self.core
    }

    fn entries(&self) -> Vec<DataRequest> {
        self.core
            .lock()
            .values()
            .cloned()
            .map(DataRequest::AddAppendOnly)
            .collect()
    }
}
