//! # Inventory Service Tests
//!
//! Nodes are wired through a loopback transport that hands messages
//! straight to the remote service.

use super::*;
use crate::domain::*;
use crate::ports::InventoryTransport;
use async_trait::async_trait;
use mn_01_data_storage::{
    AddAppendOnlyDataRequest, AuthorizationVerifier, BondedRoleRegistry, DataPayload, DataRequest, DataStorageApi,
    InMemoryStoreProvider, MetaData, StorageConfig, StorageService,
};
use parking_lot::Mutex;
use shared_bus::InMemoryEventBus;
use shared_types::{
    Address, ConnectionDirection, ConnectionId, ConnectionInfo, ManualTimeSource, TransportError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

struct Link {
    info: ConnectionInfo,
    remote_id: ConnectionId,
    remote: Weak<InventoryService>,
}

#[derive(Default)]
struct LoopbackTransport {
    links: Mutex<HashMap<ConnectionId, Link>>,
    /// Swallow outgoing requests.
    silent: AtomicBool,
    requests_sent_at: Mutex<Vec<tokio::time::Instant>>,
}

impl LoopbackTransport {
    fn remote(&self, connection: &ConnectionId) -> Result<(ConnectionId, Arc<InventoryService>), TransportError> {
        let links = self.links.lock();
        let link = links
            .get(connection)
            .ok_or_else(|| TransportError::UnknownConnection(connection.clone()))?;
        let remote = link
            .remote
            .upgrade()
            .ok_or_else(|| TransportError::ConnectionClosed(connection.clone()))?;
        Ok((link.remote_id.clone(), remote))
    }
}

#[async_trait]
impl InventoryTransport for LoopbackTransport {
    async fn send_request(
        &self,
        connection: &ConnectionId,
        request: InventoryRequest,
    ) -> Result<(), TransportError> {
        let (remote_id, remote) = self.remote(connection)?;
        self.requests_sent_at.lock().push(tokio::time::Instant::now());
        if self.silent.load(Ordering::Relaxed) {
            return Ok(());
        }
        tokio::spawn(async move {
            let _ = remote.on_request(&remote_id, request).await;
        });
        Ok(())
    }

    async fn send_response(
        &self,
        connection: &ConnectionId,
        response: InventoryResponse,
    ) -> Result<(), TransportError> {
        let (remote_id, remote) = self.remote(connection)?;
        remote.on_response(&remote_id, response);
        Ok(())
    }

    fn connections(&self) -> Vec<ConnectionInfo> {
        self.links.lock().values().map(|l| l.info.clone()).collect()
    }
}

struct Node {
    port: u16,
    storage: Arc<StorageService>,
    service: Arc<InventoryService>,
    transport: Arc<LoopbackTransport>,
    _stop: watch::Sender<bool>,
}

fn node_with(port: u16, config: InventoryConfig) -> Node {
    let storage = Arc::new(StorageService::new(
        StorageConfig::default(),
        Arc::new(InMemoryStoreProvider::new()),
        Arc::new(AuthorizationVerifier::deny_all()),
        Arc::new(BondedRoleRegistry::new()),
        Arc::new(ManualTimeSource::new(1_700_000_000_000)),
        Arc::new(InMemoryEventBus::new()),
    ));
    let transport = Arc::new(LoopbackTransport::default());
    let (stop, shutdown) = watch::channel(false);
    let service = Arc::new(InventoryService::new(
        config,
        storage.clone(),
        transport.clone(),
        shutdown,
    ));
    Node {
        port,
        storage,
        service,
        transport,
        _stop: stop,
    }
}

fn node(port: u16) -> Node {
    node_with(port, InventoryConfig::for_testing())
}

/// Connect `a` to `b`; returns the connection as seen from `a`.
fn connect(a: &Node, b: &Node) -> ConnectionInfo {
    let a_id = ConnectionId::random();
    let b_id = ConnectionId::random();
    let a_info = ConnectionInfo {
        id: a_id.clone(),
        peer_address: Address::localhost(b.port),
        direction: ConnectionDirection::Outbound,
        established_at: 0,
    };
    let b_info = ConnectionInfo {
        id: b_id.clone(),
        peer_address: Address::localhost(a.port),
        direction: ConnectionDirection::Inbound,
        established_at: 0,
    };
    a.transport.links.lock().insert(
        a_id.clone(),
        Link {
            info: a_info.clone(),
            remote_id: b_id.clone(),
            remote: Arc::downgrade(&b.service),
        },
    );
    b.transport.links.lock().insert(
        b_id,
        Link {
            info: b_info,
            remote_id: a_id,
            remote: Arc::downgrade(&a.service),
        },
    );
    a_info
}

fn disconnect(node: &Node, connection: &ConnectionId) {
    node.transport.links.lock().remove(connection);
    node.service.on_connection_closed(connection);
}

fn witness(content: &[u8]) -> AddAppendOnlyDataRequest {
    AddAppendOnlyDataRequest::new(DataPayload::new(
        "Witness",
        MetaData::new("Witness", 0),
        content.to_vec(),
    ))
}

async fn seed(node: &Node, contents: impl IntoIterator<Item = Vec<u8>>) {
    for content in contents {
        node.storage.add_append_only(witness(&content)).await.unwrap();
    }
}

fn hashes(node: &Node) -> Vec<shared_types::DataHash> {
    let mut hashes: Vec<_> = node.storage.all_entries().iter().map(DataRequest::hash).collect();
    hashes.sort();
    hashes
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// =============================================================================
// TEST GROUP 1: Round trips
// =============================================================================

#[tokio::test]
async fn test_round_trip_delivers_missing_entries() {
    let a = node(1);
    let b = node(2);
    seed(&a, (0..5u8).map(|i| vec![i])).await;
    seed(&b, (0..2u8).map(|i| vec![i])).await;
    let conn = connect(&b, &a);

    let applied = b.service.request_inventory(&conn.id).await.unwrap();

    assert_eq!(applied.received, 3);
    assert_eq!(applied.accepted, 3);
    assert_eq!(applied.num_dropped, 0);
    assert_eq!(hashes(&a), hashes(&b));
    assert_eq!(a.service.metrics().entries_served, 3);
}

#[tokio::test]
async fn test_partial_inventory_converges_over_rounds() {
    let config = InventoryConfig {
        max_size_in_kb: 1,
        ..InventoryConfig::for_testing()
    };
    let a = node_with(1, config);
    let b = node(2);
    seed(&a, (0..5u8).map(|i| vec![i; 600])).await;
    let conn = connect(&b, &a);

    let first = b.service.request_inventory(&conn.id).await.unwrap();
    assert_eq!(first.received, 1);
    assert_eq!(first.num_dropped, 4);

    for _ in 0..4 {
        b.service.request_inventory(&conn.id).await.unwrap();
    }
    assert_eq!(hashes(&a), hashes(&b));
}

#[tokio::test]
async fn test_invalid_filter_dropped_without_answer() {
    let a = node(1);
    let short_hash: shared_types::DataHash = bincode::deserialize(&bincode::serialize(&vec![1u8; 5]).unwrap()).unwrap();
    let request = InventoryRequest {
        data_filter: DataFilter::Entries(vec![FilterEntry {
            hash: short_hash,
            sequence_number: 0,
        }]),
        nonce: 7,
    };

    let result = a.service.on_request(&ConnectionId::new("peer"), request).await;

    assert!(matches!(result, Err(InventoryError::InvalidFilter(_))));
    assert_eq!(a.service.metrics().invalid_filters, 1);
    assert_eq!(a.service.metrics().requests_served, 0);
}

// =============================================================================
// TEST GROUP 2: Timeouts and cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_silent_peer_times_out() {
    let a = node(1);
    let b = node(2);
    let conn = connect(&b, &a);
    b.transport.silent.store(true, Ordering::Relaxed);

    let result = b.service.request_inventory(&conn.id).await;

    assert!(matches!(result, Err(InventoryError::Timeout { .. })));
    assert_eq!(b.service.num_pending_requests(), 0);
    assert_eq!(b.service.metrics().requests_failed, 1);
}

#[tokio::test]
async fn test_connection_close_cancels_request() {
    let a = node(1);
    let b = node(2);
    let conn = connect(&b, &a);
    b.transport.silent.store(true, Ordering::Relaxed);

    let service = b.service.clone();
    let id = conn.id.clone();
    let pending = tokio::spawn(async move { service.request_inventory(&id).await });
    wait_until(|| b.service.num_pending_requests() == 1).await;

    disconnect(&b, &conn.id);

    assert!(matches!(pending.await.unwrap(), Err(InventoryError::Cancelled(_))));
    assert_eq!(b.service.num_pending_requests(), 0);
}

#[tokio::test]
async fn test_unknown_connection_fails_fast() {
    let b = node(2);
    let result = b.service.request_inventory(&ConnectionId::new("gone")).await;
    assert!(matches!(result, Err(InventoryError::Transport(_))));
    assert_eq!(b.service.num_pending_requests(), 0);
}

// =============================================================================
// TEST GROUP 3: Sync policy
// =============================================================================

#[tokio::test]
async fn test_initial_sync_completes_after_min_responses() {
    let a1 = node(1);
    let a2 = node(2);
    let b = node(3);
    seed(&a1, (0..3u8).map(|i| vec![i])).await;
    seed(&a2, (3..6u8).map(|i| vec![i])).await;
    let c1 = connect(&b, &a1);
    let c2 = connect(&b, &a2);

    assert!(b.service.on_connection(&c1).is_some());
    assert!(b.service.on_connection(&c2).is_some());
    wait_until(|| b.service.initial_requests_completed()).await;

    assert_eq!(b.storage.all_entries().len(), 6);
    // No more initial requests once synced.
    assert!(b.service.on_connection(&c1).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_partial_responses_retry_after_delay() {
    let config = InventoryConfig {
        max_size_in_kb: 1,
        ..InventoryConfig::for_testing()
    };
    let a = node_with(1, config);
    let b = node(2);
    seed(&a, (0..4u8).map(|i| vec![i; 600])).await;
    let conn = connect(&b, &a);

    let initial = b.service.on_connection(&conn).unwrap();
    initial.await.unwrap();

    assert_eq!(hashes(&a), hashes(&b));
    let sent_at = b.transport.requests_sent_at.lock().clone();
    assert!(sent_at.len() >= 4, "only {} requests", sent_at.len());
    let retry_delay = InventoryConfig::for_testing().retry_delay;
    for pair in sent_at.windows(2) {
        assert!(pair[1] - pair[0] >= retry_delay);
    }
}

#[tokio::test]
async fn test_all_connections_lost_resets_sync() {
    let a1 = node(1);
    let a2 = node(2);
    let b = node(3);
    let c1 = connect(&b, &a1);
    let c2 = connect(&b, &a2);
    b.service.on_connection(&c1);
    b.service.on_connection(&c2);
    wait_until(|| b.service.initial_requests_completed()).await;

    disconnect(&b, &c1.id);
    assert!(b.service.initial_requests_completed());
    disconnect(&b, &c2.id);
    assert!(!b.service.initial_requests_completed());

    let c3 = connect(&b, &a1);
    assert!(b.service.on_connection(&c3).is_some());
}

#[tokio::test]
async fn test_completion_hook_sees_sent_inventory() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let storage = Arc::new(StorageService::new(
        StorageConfig::default(),
        Arc::new(InMemoryStoreProvider::new()),
        Arc::new(AuthorizationVerifier::deny_all()),
        Arc::new(BondedRoleRegistry::new()),
        Arc::new(ManualTimeSource::new(1_700_000_000_000)),
        Arc::new(InMemoryEventBus::new()),
    ));
    storage.add_append_only(witness(b"x")).await.unwrap();
    let transport = Arc::new(LoopbackTransport::default());
    let (_stop, shutdown) = watch::channel(false);
    let a = Node {
        port: 1,
        storage: storage.clone(),
        service: Arc::new(
            InventoryService::new(InventoryConfig::for_testing(), storage, transport.clone(), shutdown)
                .with_completion_hook(Box::new(move |_, inventory| sink.lock().push(inventory.len()))),
        ),
        transport,
        _stop,
    };
    let b = node(2);
    let conn = connect(&b, &a);

    b.service.request_inventory(&conn.id).await.unwrap();

    assert_eq!(*seen.lock(), vec![1]);
}
