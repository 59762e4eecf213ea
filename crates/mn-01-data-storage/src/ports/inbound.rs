//! # Inbound Ports (Driving Ports)

use async_trait::async_trait;

use crate::domain::{
    AddAppendOnlyDataRequest, AddAuthenticatedDataRequest, DataRequest, DataStorageResult,
    RefreshAuthenticatedDataRequest, RemoveAuthenticatedDataRequest, StorageError,
};
use crate::service::StorageReport;

/// Primary API of the data storage subsystem.
#[async_trait]
pub trait DataStorageApi: Send + Sync {
    async fn add_append_only(
        &self,
        request: AddAppendOnlyDataRequest,
    ) -> Result<DataStorageResult, StorageError>;

    async fn add_authenticated(
        &self,
        request: AddAuthenticatedDataRequest,
    ) -> Result<DataStorageResult, StorageError>;

    async fn remove_authenticated(
        &self,
        request: RemoveAuthenticatedDataRequest,
    ) -> Result<DataStorageResult, StorageError>;

    async fn refresh_authenticated(
        &self,
        request: RefreshAuthenticatedDataRequest,
    ) -> Result<DataStorageResult, StorageError>;

    /// Route any request to the store it belongs to.
    async fn process(&self, request: DataRequest) -> Result<DataStorageResult, StorageError>;

    /// Snapshot of every stored request across all stores.
    fn all_entries(&self) -> Vec<DataRequest>;

    fn storage_report(&self) -> StorageReport;
}
