//! # Connection Table
//!
//! Owns every live connection of the node, whatever dialer opened it, and
//! implements the outbound ports of the services on top of it.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! dial ──→ Hello ──→ register(Outbound) ──┐
//!                                         ├──→ Connected ─→ Message* ─→ Closed
//! accept ─→ wait Hello → register(Inbound)┘
//! ```
//!
//! `Closed` is emitted exactly once per connection, by whichever side
//! removes it from the table first: the read loop on EOF or a local close.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mesh_telemetry::metrics::MESSAGES_SENT;
use mn_02_inventory::{InventoryRequest, InventoryResponse, InventoryTransport};
use mn_03_peer_group::{CloseReason, PeerExchangeRequest, PeerExchangeResponse, PeerTransport};
use mn_04_resend::{ConfidentialSender, ResendMessageData};
use mn_05_network_load::{ConnectionMetrics, ConnectionMetricsRecorder, ConnectionMetricsSource};
use parking_lot::{Mutex, RwLock};
use shared_types::{
    Address, ConnectionDirection, ConnectionId, ConnectionInfo, TimeSource, TransportError,
    TransportType,
};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::wiring::NetworkMessage;

/// Both directions of a freshly opened byte-frame channel.
pub struct Link {
    pub outgoing: mpsc::UnboundedSender<Vec<u8>>,
    pub incoming: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Opens links to remote addresses.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, address: &Address) -> Result<Link, TransportError>;
}

/// What the connection table reports to the message router.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    Connected(ConnectionInfo),
    Message {
        connection: ConnectionInfo,
        message: NetworkMessage,
    },
    Closed(ConnectionInfo),
}

struct Connection {
    info: ConnectionInfo,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    traffic: Mutex<ConnectionMetricsRecorder>,
    reader: Mutex<Option<AbortHandle>>,
}

pub struct NodeNetwork {
    me: Weak<NodeNetwork>,
    my_address: Address,
    dialer: Arc<dyn Dialer>,
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    events: mpsc::UnboundedSender<NetworkEvent>,
    clock: Arc<dyn TimeSource>,
    handshake_timeout: Duration,
    // One dial at a time so two callers never open two links to one address.
    dialing: tokio::sync::Mutex<()>,
}

impl NodeNetwork {
    pub fn new(
        my_address: Address,
        dialer: Arc<dyn Dialer>,
        clock: Arc<dyn TimeSource>,
        handshake_timeout: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<NetworkEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let network = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            my_address,
            dialer,
            connections: RwLock::new(HashMap::new()),
            events,
            clock,
            handshake_timeout,
            dialing: tokio::sync::Mutex::new(()),
        });
        (network, receiver)
    }

    pub fn my_address(&self) -> &Address {
        &self.my_address
    }

    pub fn connection_infos(&self) -> Vec<ConnectionInfo> {
        self.connections.read().values().map(|c| c.info.clone()).collect()
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<ConnectionInfo> {
        self.connections.read().get(id).map(|c| c.info.clone())
    }

    /// Oldest live connection to `address`.
    pub fn connection_to(&self, address: &Address) -> Option<ConnectionInfo> {
        self.connections
            .read()
            .values()
            .filter(|c| &c.info.peer_address == address)
            .map(|c| c.info.clone())
            .min_by_key(|info| info.established_at)
    }

    pub fn num_connections(&self) -> usize {
        self.connections.read().len()
    }

    // =========================================================================
    // OPENING
    // =========================================================================

    /// Return the live connection to `address` or dial a new one.
    pub async fn connect(&self, address: &Address) -> Result<ConnectionInfo, TransportError> {
        if let Some(info) = self.connection_to(address) {
            return Ok(info);
        }
        if address == &self.my_address {
            return Err(TransportError::ConnectionFailed {
                address: address.clone(),
                reason: "refusing to connect to ourselves".to_string(),
            });
        }
        let _dialing = self.dialing.lock().await;
        if let Some(info) = self.connection_to(address) {
            return Ok(info);
        }

        let link = self.dialer.dial(address).await?;
        let hello = NetworkMessage::Hello {
            address: self.my_address.clone(),
        }
        .encode()?;
        link.outgoing
            .send(hello)
            .map_err(|_| TransportError::ConnectionFailed {
                address: address.clone(),
                reason: "link closed during handshake".to_string(),
            })?;
        self.register(address.clone(), ConnectionDirection::Outbound, link)
    }

    /// Wait for the dialer's `Hello` on an accepted link, then register it.
    pub fn accept(&self, mut link: Link) {
        let Some(network) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let first = tokio::time::timeout(network.handshake_timeout, link.incoming.recv()).await;
            let address = match first {
                Ok(Some(frame)) => match NetworkMessage::decode(&frame) {
                    Ok(NetworkMessage::Hello { address }) if address.is_valid() => address,
                    Ok(other) => {
                        warn!(message = other.name(), "Inbound link did not open with Hello");
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "Undecodable handshake frame");
                        return;
                    }
                },
                Ok(None) => return,
                Err(_) => {
                    debug!("Inbound handshake timed out");
                    return;
                }
            };
            if let Err(e) = network.register(address, ConnectionDirection::Inbound, link) {
                debug!(error = %e, "Registering inbound connection failed");
            }
        });
    }

    fn register(
        &self,
        peer_address: Address,
        direction: ConnectionDirection,
        link: Link,
    ) -> Result<ConnectionInfo, TransportError> {
        let network = self.me.upgrade().ok_or(TransportError::Shutdown)?;
        let info = ConnectionInfo {
            id: ConnectionId::random(),
            peer_address,
            direction,
            established_at: self.clock.now_millis(),
        };
        let connection = Arc::new(Connection {
            info: info.clone(),
            outgoing: link.outgoing,
            traffic: Mutex::new(ConnectionMetricsRecorder::new()),
            reader: Mutex::new(None),
        });
        self.connections.write().insert(info.id.clone(), connection.clone());
        info!(connection = %info.id, peer = %info.peer_address, ?direction, "Connection established");
        let _ = self.events.send(NetworkEvent::Connected(info.clone()));

        let reader = tokio::spawn(network.read_loop(connection.clone(), link.incoming));
        *connection.reader.lock() = Some(reader.abort_handle());
        Ok(info)
    }

    async fn read_loop(self: Arc<Self>, connection: Arc<Connection>, mut incoming: mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Some(frame) = incoming.recv().await {
            let started = Instant::now();
            let decoded = NetworkMessage::decode(&frame);
            connection.traffic.lock().on_received(
                self.clock.now_millis(),
                frame.len() as u64,
                elapsed_ms(started),
            );
            match decoded {
                Ok(message) => {
                    let _ = self.events.send(NetworkEvent::Message {
                        connection: connection.info.clone(),
                        message,
                    });
                }
                Err(e) => {
                    warn!(connection = %connection.info.id, error = %e, "Dropping connection after undecodable frame");
                    break;
                }
            }
        }
        self.remove(&connection.info.id);
    }

    // =========================================================================
    // SENDING AND CLOSING
    // =========================================================================

    pub fn send(&self, id: &ConnectionId, message: &NetworkMessage) -> Result<(), TransportError> {
        let connection = self
            .connections
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::UnknownConnection(id.clone()))?;
        let started = Instant::now();
        let frame = message.encode()?;
        let size = frame.len() as u64;
        connection
            .outgoing
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed(id.clone()))?;
        connection
            .traffic
            .lock()
            .on_sent(self.clock.now_millis(), size, elapsed_ms(started));
        MESSAGES_SENT.with_label_values(&[message.name()]).inc();
        Ok(())
    }

    /// Send to every connection except `except`. Returns the number reached.
    pub fn broadcast(&self, message: &NetworkMessage, except: Option<&ConnectionId>) -> usize {
        let targets: Vec<ConnectionId> = self
            .connections
            .read()
            .keys()
            .filter(|id| Some(*id) != except)
            .cloned()
            .collect();
        targets
            .iter()
            .filter(|id| match self.send(id, message) {
                Ok(()) => true,
                Err(e) => {
                    debug!(connection = %id, error = %e, "Broadcast send failed");
                    false
                }
            })
            .count()
    }

    pub fn close(&self, id: &ConnectionId) -> bool {
        self.remove(id)
    }

    pub fn close_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.read().keys().cloned().collect();
        ids.iter().filter(|id| self.remove(id)).count()
    }

    fn remove(&self, id: &ConnectionId) -> bool {
        let Some(connection) = self.connections.write().remove(id) else {
            return false;
        };
        if let Some(reader) = connection.reader.lock().take() {
            reader.abort();
        }
        info!(connection = %id, peer = %connection.info.peer_address, "Connection closed");
        let _ = self.events.send(NetworkEvent::Closed(connection.info.clone()));
        true
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// SERVICE PORTS
// =============================================================================

#[async_trait]
impl PeerTransport for NodeNetwork {
    fn transport_type(&self) -> TransportType {
        self.my_address.transport_type()
    }

    fn my_address(&self) -> Option<Address> {
        Some(self.my_address.clone())
    }

    fn connections(&self) -> Vec<ConnectionInfo> {
        let transport = self.my_address.transport_type();
        self.connection_infos()
            .into_iter()
            .filter(|c| c.transport_type() == transport)
            .collect()
    }

    async fn connect(&self, address: &Address) -> Result<ConnectionInfo, TransportError> {
        NodeNetwork::connect(self, address).await
    }

    async fn send_exchange_request(
        &self,
        connection: &ConnectionId,
        request: PeerExchangeRequest,
    ) -> Result<(), TransportError> {
        self.send(connection, &NetworkMessage::PeerExchangeRequest(request))
    }

    async fn send_exchange_response(
        &self,
        connection: &ConnectionId,
        response: PeerExchangeResponse,
    ) -> Result<(), TransportError> {
        self.send(connection, &NetworkMessage::PeerExchangeResponse(response))
    }

    async fn close(&self, connection: &ConnectionId, reason: CloseReason) {
        if self.remove(connection) {
            debug!(%connection, ?reason, "Closed by peer group maintenance");
        }
    }
}

#[async_trait]
impl InventoryTransport for NodeNetwork {
    async fn send_request(
        &self,
        connection: &ConnectionId,
        request: InventoryRequest,
    ) -> Result<(), TransportError> {
        self.send(connection, &NetworkMessage::InventoryRequest(request))
    }

    async fn send_response(
        &self,
        connection: &ConnectionId,
        response: InventoryResponse,
    ) -> Result<(), TransportError> {
        self.send(connection, &NetworkMessage::InventoryResponse(response))
    }

    fn connections(&self) -> Vec<ConnectionInfo> {
        self.connection_infos()
    }
}

impl ConnectionMetricsSource for NodeNetwork {
    fn connection_metrics(&self) -> Vec<ConnectionMetrics> {
        let now = self.clock.now_millis();
        self.connections
            .read()
            .values()
            .map(|c| c.traffic.lock().last_hour(now))
            .collect()
    }
}

#[async_trait]
impl ConfidentialSender for NodeNetwork {
    async fn resend(&self, data: &ResendMessageData) -> Result<(), TransportError> {
        let connection = NodeNetwork::connect(self, &data.receiver_address).await?;
        self.send(
            &connection.id,
            &NetworkMessage::ConfidentialMessage {
                message_id: data.message_id.clone(),
                sender_network_id: data.sender_network_id.clone(),
                payload: data.payload.clone(),
            },
        )
    }
}
