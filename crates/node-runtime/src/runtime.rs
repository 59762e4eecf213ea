//! # Node Runtime
//!
//! Owns the service container, the message router and every background
//! task. Start order:
//!
//! 1. Restore stores and start the bonded role listener and the prune task
//! 2. Restore pending confidential messages
//! 3. Start routing network events
//! 4. Restore peers, run the initial peer exchange, start house keeping
//! 5. Start the network load monitor and the metrics mirror
//! 6. Replay pending confidential messages
//!
//! Shutdown signals every task through one watch channel, closes all
//! connections and flushes what is persisted.

use std::sync::Arc;
use std::time::Duration;

use mesh_telemetry::metrics::{HistogramTimer, INVENTORY_ROUND_DURATION};
use mn_01_data_storage::{DataRequest, DataStorageResult, StorageError, StorageReport};
use mn_02_inventory::{AppliedInventory, InventoryError};
use mn_04_resend::{ConfidentialSender, ResendError, ResendMessageData};
use parking_lot::Mutex;
use shared_types::{Address, ConnectionId, MessageDeliveryStatus, TimeSource, TransportError};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::{Dialer, NetworkEvent, NodeNetwork, PersistenceBackend};
use crate::container::{ConfigError, NodeConfig, ServiceContainer};
use crate::wiring::{ConfidentialDelivery, MessageRouter, MetricsMirror, NetworkMessage, ReportRequests};

const INBOX_CAPACITY: usize = 256;
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("resend error: {0}")]
    Resend(#[from] ResendError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no response from {0} in time")]
    Timeout(ConnectionId),

    #[error("runtime already started")]
    AlreadyStarted,
}

/// What [`NodeRuntime::start`] restored and achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    pub restored_entries: usize,
    pub pending_messages: usize,
    pub initial_exchange_succeeded: bool,
    pub replayed_messages: usize,
}

pub struct NodeRuntime {
    services: Arc<ServiceContainer>,
    router: Arc<MessageRouter>,
    reports: Arc<ReportRequests>,
    inbox: broadcast::Sender<ConfidentialDelivery>,
    events: Mutex<Option<mpsc::UnboundedReceiver<NetworkEvent>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeRuntime {
    /// Build every service. Nothing runs until [`NodeRuntime::start`].
    pub fn new(
        config: NodeConfig,
        dialer: Arc<dyn Dialer>,
        backend: &PersistenceBackend,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (network, events) = NodeNetwork::new(
            config.listen_address()?,
            dialer,
            clock.clone(),
            config.handshake_timeout(),
        );
        let services = Arc::new(ServiceContainer::new(
            config,
            network,
            backend,
            clock,
            shutdown_rx.clone(),
        )?);

        let reports = Arc::new(ReportRequests::new());
        let (inbox, _) = broadcast::channel(INBOX_CAPACITY);
        let router = Arc::new(MessageRouter::new(services.clone(), reports.clone(), inbox.clone()));

        Ok(Self {
            services,
            router,
            reports,
            inbox,
            events: Mutex::new(Some(events)),
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn services(&self) -> &Arc<ServiceContainer> {
        &self.services
    }

    pub fn network(&self) -> &Arc<NodeNetwork> {
        &self.services.network
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub async fn start(&self) -> Result<StartupReport, RuntimeError> {
        let events = self.events.lock().take().ok_or(RuntimeError::AlreadyStarted)?;
        let services = &self.services;
        let mut tasks = Vec::new();

        let restored_entries = services.storage.initialize().await?;
        tasks.push(services.storage.clone().spawn_prune_task(self.shutdown_rx.clone()));

        let pending_messages = services.resend.initialize().await?;

        tasks.push(self.router.clone().spawn(events, self.shutdown_rx.clone()));

        let (initial_exchange_succeeded, house_keeping) = services.peer_group.initialize().await;
        tasks.push(house_keeping);

        tasks.push(services.network_load.spawn());
        let metrics_interval = Duration::from_secs(services.config.monitor.metrics_interval_secs.max(1));
        tasks.push(
            Arc::new(MetricsMirror::new(services.clone())).spawn(metrics_interval, self.shutdown_rx.clone()),
        );
        self.tasks.lock().extend(tasks);

        let replayed_messages = services.resend.replay_pending(services.network.as_ref()).await;

        let report = StartupReport {
            restored_entries,
            pending_messages,
            initial_exchange_succeeded,
            replayed_messages,
        };
        info!(
            address = %services.network.my_address(),
            restored_entries,
            pending_messages,
            initial_exchange_succeeded,
            replayed_messages,
            "Node started"
        );
        Ok(report)
    }

    // =========================================================================
    // DATA
    // =========================================================================

    /// Store locally created data and gossip it when it was new.
    pub async fn publish(&self, request: DataRequest) -> Result<DataStorageResult, RuntimeError> {
        Ok(self.router.process_data(None, request).await?)
    }

    /// Ask `connection` for its store sizes.
    pub async fn request_storage_report(&self, connection: &ConnectionId) -> Result<StorageReport, RuntimeError> {
        if self.services.network.connection(connection).is_none() {
            return Err(TransportError::UnknownConnection(connection.clone()).into());
        }
        let (request_id, response, _guard) = self.reports.register(connection);
        self.services
            .network
            .send(connection, &NetworkMessage::StorageReportingRequest { request_id })?;

        match tokio::time::timeout(self.services.config.request_timeout(), response).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(_)) => Err(TransportError::ConnectionClosed(connection.clone()).into()),
            Err(_) => Err(RuntimeError::Timeout(connection.clone())),
        }
    }

    /// One inventory round trip outside the scheduled ones.
    pub async fn request_inventory(&self, connection: &ConnectionId) -> Result<AppliedInventory, RuntimeError> {
        let _timer = HistogramTimer::new(&INVENTORY_ROUND_DURATION);
        Ok(self.services.inventory.request_inventory(connection).await?)
    }

    // =========================================================================
    // CONFIDENTIAL MESSAGES
    // =========================================================================

    /// Send `payload` to `receiver`, tracking it until acknowledged.
    /// Returns the message id.
    pub async fn send_confidential(
        &self,
        receiver: Address,
        receiver_public_key: Vec<u8>,
        payload: Vec<u8>,
    ) -> Result<String, RuntimeError> {
        let services = &self.services;
        let message_id = uuid::Uuid::new_v4().to_string();
        let data = ResendMessageData::new(
            message_id.clone(),
            payload,
            receiver,
            receiver_public_key,
            &services.node_key,
            services.network_id.clone(),
            MessageDeliveryStatus::Connecting,
            services.clock.now_millis(),
        );
        services.resend.handle(&data);

        match services.network.resend(&data).await {
            Ok(()) => {
                services.resend.on_delivery_status(&message_id, MessageDeliveryStatus::Sent);
                Ok(message_id)
            }
            Err(e) => {
                warn!(%message_id, receiver = %data.receiver_address, error = %e, "Sending message failed");
                services.resend.on_delivery_status(&message_id, MessageDeliveryStatus::Failed);
                Err(e.into())
            }
        }
    }

    /// User triggered resend of a pending message.
    pub async fn resend_confidential(&self, message_id: &str) -> Result<(), RuntimeError> {
        let services = &self.services;
        Ok(services
            .resend
            .manual_resend(message_id, services.network.as_ref())
            .await?)
    }

    /// Confidential messages delivered to this node from now on.
    pub fn subscribe_confidential(&self) -> broadcast::Receiver<ConfidentialDelivery> {
        self.inbox.subscribe()
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    pub async fn shutdown(&self) {
        info!(address = %self.services.network.my_address(), "Shutting down node");
        let _ = self.shutdown_tx.send(true);

        self.services.peer_group.shutdown().await;
        self.services.network.close_all();
        if let Err(e) = self.services.storage.shutdown().await {
            warn!(error = %e, "Flushing stores failed");
        }
        if let Err(e) = self.services.resend.flush().await {
            warn!(error = %e, "Flushing resend messages failed");
        }

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if tokio::time::timeout(TASK_STOP_TIMEOUT, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!("Background tasks did not stop in time");
        }
        info!("Node stopped");
    }
}
