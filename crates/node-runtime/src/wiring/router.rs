//! # Message Router
//!
//! Single consumer of the connection table's events. Connection lifecycle
//! goes to every service that tracks connections; each message goes to the
//! service that owns it.
//!
//! Gossip: data that storage accepts as new is forwarded to every other
//! connection. Redundant or rejected data stops here, which is what ends
//! the flood.

use std::sync::Arc;

use mesh_telemetry::metrics::{DATA_ADD_RESULTS, MESSAGES_RECEIVED};
use mn_01_data_storage::{DataRequest, DataStorageApi, DataStorageResult, StorageError};
use shared_types::{ConnectionInfo, MessageDeliveryStatus, NetworkId};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::NetworkMessage;
use super::reporting::ReportRequests;
use crate::adapters::NetworkEvent;
use crate::container::ServiceContainer;

/// A confidential message delivered to this node.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidentialDelivery {
    pub message_id: String,
    pub sender_network_id: NetworkId,
    pub payload: Vec<u8>,
}

pub struct MessageRouter {
    services: Arc<ServiceContainer>,
    reports: Arc<ReportRequests>,
    inbox: broadcast::Sender<ConfidentialDelivery>,
}

impl MessageRouter {
    pub fn new(
        services: Arc<ServiceContainer>,
        reports: Arc<ReportRequests>,
        inbox: broadcast::Sender<ConfidentialDelivery>,
    ) -> Self {
        Self {
            services,
            reports,
            inbox,
        }
    }

    /// Route events until shutdown or until the connection table is gone.
    pub fn spawn(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<NetworkEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => self.handle(event).await,
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Message router stopped");
        })
    }

    pub async fn handle(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected(connection) => self.on_connected(&connection),
            NetworkEvent::Closed(connection) => self.on_closed(&connection),
            NetworkEvent::Message {
                connection,
                message,
            } => self.on_message(&connection, message).await,
        }
    }

    fn on_connected(&self, connection: &ConnectionInfo) {
        self.services.peer_group.peer_group().on_connection(connection);
        self.services.inventory.on_connection(connection);
    }

    fn on_closed(&self, connection: &ConnectionInfo) {
        self.services.peer_group.exchange().on_connection_closed(connection);
        self.services.inventory.on_connection_closed(&connection.id);
        self.reports.cancel_connection(&connection.id);
    }

    async fn on_message(&self, connection: &ConnectionInfo, message: NetworkMessage) {
        MESSAGES_RECEIVED.with_label_values(&[message.name()]).inc();
        let network = &self.services.network;

        match message {
            NetworkMessage::Hello { .. } => {
                debug!(connection = %connection.id, "Ignoring repeated Hello");
            }
            NetworkMessage::Data(request) => {
                if let Err(e) = self.process_data(Some(connection), request).await {
                    warn!(connection = %connection.id, error = %e, "Storing gossiped data failed");
                }
            }
            NetworkMessage::StorageReportingRequest { request_id } => {
                let storage_report = self.services.storage.storage_report();
                let response = NetworkMessage::StorageReportingResponse {
                    request_id,
                    storage_report,
                };
                if let Err(e) = network.send(&connection.id, &response) {
                    debug!(connection = %connection.id, error = %e, "Sending storage report failed");
                }
            }
            NetworkMessage::StorageReportingResponse {
                request_id,
                storage_report,
            } => {
                if !self.reports.resolve(&connection.id, request_id, storage_report) {
                    debug!(connection = %connection.id, request_id, "Unexpected storage report");
                }
            }
            NetworkMessage::InventoryRequest(request) => {
                let inventory = self.services.inventory.clone();
                let id = connection.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = inventory.on_request(&id, request).await {
                        debug!(connection = %id, error = %e, "Inventory request not served");
                    }
                });
            }
            NetworkMessage::InventoryResponse(response) => {
                self.services.inventory.on_response(&connection.id, response);
            }
            NetworkMessage::PeerExchangeRequest(request) => {
                let exchange = self.services.peer_group.exchange();
                if let Err(e) = exchange.on_request(connection, request).await {
                    debug!(connection = %connection.id, error = %e, "Peer exchange request not served");
                }
            }
            NetworkMessage::PeerExchangeResponse(response) => {
                self.services.peer_group.exchange().on_response(&connection.id, response);
            }
            NetworkMessage::ConfidentialMessage {
                message_id,
                sender_network_id,
                payload,
            } => {
                let ack = NetworkMessage::ConfidentialAck {
                    message_id: message_id.clone(),
                };
                if let Err(e) = network.send(&connection.id, &ack) {
                    debug!(connection = %connection.id, error = %e, "Acknowledging message failed");
                }
                info!(%message_id, from = %connection.peer_address, "Confidential message received");
                // Nobody listening is fine, the message was acknowledged.
                let _ = self.inbox.send(ConfidentialDelivery {
                    message_id,
                    sender_network_id,
                    payload,
                });
            }
            NetworkMessage::ConfidentialAck { message_id } => {
                self.services
                    .resend
                    .on_delivery_status(&message_id, MessageDeliveryStatus::AckReceived);
            }
        }
    }

    /// Store `request` and forward it to every connection except `origin`
    /// when it was new. `origin` is `None` for locally published data.
    pub async fn process_data(
        &self,
        origin: Option<&ConnectionInfo>,
        request: DataRequest,
    ) -> Result<DataStorageResult, StorageError> {
        let family = request.family();
        let result = self.services.storage.process(request.clone()).await?;
        DATA_ADD_RESULTS
            .with_label_values(&[family.as_str(), result.as_str()])
            .inc();

        if result.is_success() {
            let forwarded = self
                .services
                .network
                .broadcast(&NetworkMessage::Data(request), origin.map(|c| &c.id));
            debug!(forwarded, "Gossiped new data");
        } else if result.is_adversarial() {
            if let Some(origin) = origin {
                warn!(peer = %origin.peer_address, %result, "Peer sent invalid data");
            }
        } else {
            debug!(%result, "Data not stored");
        }
        Ok(result)
    }
}
