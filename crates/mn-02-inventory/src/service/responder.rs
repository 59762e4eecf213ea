//! # Inventory Responder
//!
//! Answers an [`InventoryRequest`] with everything the requester's filter
//! lacks, within the byte budget. Invalid filters are dropped silently.

use std::sync::Arc;

use mn_01_data_storage::DataStorageApi;
use shared_types::ConnectionId;
use tracing::{debug, info};

use super::metrics::InventoryMetrics;
use crate::domain::{Inventory, InventoryError, InventoryRequest, InventoryResponse};
use crate::ports::InventoryTransport;

/// Called after a response went out.
pub type CompletionHook = Box<dyn Fn(&ConnectionId, &Inventory) + Send + Sync>;

pub struct InventoryResponder {
    storage: Arc<dyn DataStorageApi>,
    transport: Arc<dyn InventoryTransport>,
    metrics: Arc<InventoryMetrics>,
    max_size_bytes: usize,
    on_complete: Option<CompletionHook>,
}

impl InventoryResponder {
    pub fn new(
        storage: Arc<dyn DataStorageApi>,
        transport: Arc<dyn InventoryTransport>,
        metrics: Arc<InventoryMetrics>,
        max_size_bytes: usize,
    ) -> Self {
        Self {
            storage,
            transport,
            metrics,
            max_size_bytes,
            on_complete: None,
        }
    }

    pub fn with_completion_hook(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Build the inventory for `request` without sending it.
    pub fn build_inventory(&self, request: &InventoryRequest) -> Inventory {
        Inventory::build(
            self.storage.all_entries(),
            &request.data_filter,
            self.max_size_bytes,
        )
    }

    /// Returns the number of entries sent.
    pub async fn handle_request(
        &self,
        connection: &ConnectionId,
        request: InventoryRequest,
    ) -> Result<usize, InventoryError> {
        if !request.data_filter.is_valid() {
            self.metrics.record_invalid_filter();
            info!(%connection, "Dropping inventory request with invalid filter");
            return Err(InventoryError::InvalidFilter(connection.clone()));
        }

        let inventory = self.build_inventory(&request);
        let sent = inventory.len();
        debug!(
            %connection,
            entries = sent,
            dropped = inventory.num_dropped,
            "Answering inventory request"
        );
        let response = InventoryResponse {
            inventory,
            request_nonce: request.nonce,
        };
        let copy = self.on_complete.as_ref().map(|_| response.inventory.clone());
        self.transport.send_response(connection, response).await?;
        self.metrics.record_served(sent);

        if let (Some(hook), Some(inventory)) = (&self.on_complete, copy) {
            hook(connection, &inventory);
        }
        Ok(sent)
    }
}
