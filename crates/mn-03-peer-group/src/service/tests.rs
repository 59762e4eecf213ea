//! # Peer Group Tests
//!
//! Nodes live on a loopback network: `connect` links two transports
//! directly and messages are handed to the remote exchange service.

use super::*;
use crate::adapters::InMemoryBanList;
use crate::domain::*;
use crate::ports::PeerTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_persistence::InMemoryPersistence;
use shared_types::{
    Address, ConnectionDirection, ConnectionId, ConnectionInfo, ManualTimeSource, TransportError,
    TransportType,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

const NOW: u64 = 1_700_000_000_000;
const DAY_MS: u64 = 24 * 60 * 60 * 1000;

static ESTABLISHED: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct Endpoint {
    transport: Weak<LoopbackTransport>,
    exchange: Weak<PeerExchangeService>,
}

#[derive(Default)]
struct Network {
    endpoints: Mutex<HashMap<Address, Endpoint>>,
}

impl Network {
    fn endpoint(&self, address: &Address) -> Option<(Arc<LoopbackTransport>, Arc<PeerExchangeService>)> {
        let endpoint = self.endpoints.lock().get(address).cloned()?;
        Some((endpoint.transport.upgrade()?, endpoint.exchange.upgrade()?))
    }
}

struct Link {
    info: ConnectionInfo,
    remote_id: ConnectionId,
    remote: Address,
}

struct LoopbackTransport {
    me: Address,
    network: Arc<Network>,
    links: Mutex<HashMap<ConnectionId, Link>>,
    closed: Mutex<Vec<(ConnectionId, CloseReason)>>,
    /// Swallow incoming exchange requests.
    silent: AtomicBool,
}

impl LoopbackTransport {
    fn new(me: Address, network: Arc<Network>) -> Self {
        Self {
            me,
            network,
            links: Mutex::new(HashMap::new()),
            closed: Mutex::new(Vec::new()),
            silent: AtomicBool::new(false),
        }
    }

    /// Always opens a new connection, even when one exists.
    fn open(&self, address: &Address) -> Result<ConnectionInfo, TransportError> {
        let (remote_transport, _) = self.network.endpoint(address).ok_or_else(|| {
            TransportError::ConnectionFailed {
                address: address.clone(),
                reason: "unreachable".to_string(),
            }
        })?;
        let established_at = ESTABLISHED.fetch_add(1, Ordering::SeqCst);
        let local_id = ConnectionId::random();
        let remote_id = ConnectionId::random();
        let local = ConnectionInfo {
            id: local_id.clone(),
            peer_address: address.clone(),
            direction: ConnectionDirection::Outbound,
            established_at,
        };
        let remote = ConnectionInfo {
            id: remote_id.clone(),
            peer_address: self.me.clone(),
            direction: ConnectionDirection::Inbound,
            established_at,
        };
        self.links.lock().insert(
            local_id.clone(),
            Link {
                info: local.clone(),
                remote_id: remote_id.clone(),
                remote: address.clone(),
            },
        );
        remote_transport.links.lock().insert(
            remote_id,
            Link {
                info: remote,
                remote_id: local_id,
                remote: self.me.clone(),
            },
        );
        Ok(local)
    }

    fn link(&self, connection: &ConnectionId) -> Result<(ConnectionId, Address), TransportError> {
        self.links
            .lock()
            .get(connection)
            .map(|l| (l.remote_id.clone(), l.remote.clone()))
            .ok_or_else(|| TransportError::UnknownConnection(connection.clone()))
    }

    fn closed(&self) -> Vec<(ConnectionId, CloseReason)> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Clear
    }

    fn my_address(&self) -> Option<Address> {
        Some(self.me.clone())
    }

    fn connections(&self) -> Vec<ConnectionInfo> {
        self.links.lock().values().map(|l| l.info.clone()).collect()
    }

    async fn connect(&self, address: &Address) -> Result<ConnectionInfo, TransportError> {
        let existing = self
            .links
            .lock()
            .values()
            .find(|l| &l.info.peer_address == address)
            .map(|l| l.info.clone());
        match existing {
            Some(info) => Ok(info),
            None => self.open(address),
        }
    }

    async fn send_exchange_request(
        &self,
        connection: &ConnectionId,
        request: PeerExchangeRequest,
    ) -> Result<(), TransportError> {
        let (remote_id, remote) = self.link(connection)?;
        let (remote_transport, remote_exchange) = self
            .network
            .endpoint(&remote)
            .ok_or_else(|| TransportError::ConnectionClosed(connection.clone()))?;
        if remote_transport.silent.load(Ordering::SeqCst) {
            return Ok(());
        }
        let info = remote_transport
            .links
            .lock()
            .get(&remote_id)
            .map(|l| l.info.clone())
            .ok_or_else(|| TransportError::ConnectionClosed(connection.clone()))?;
        tokio::spawn(async move {
            let _ = remote_exchange.on_request(&info, request).await;
        });
        Ok(())
    }

    async fn send_exchange_response(
        &self,
        connection: &ConnectionId,
        response: PeerExchangeResponse,
    ) -> Result<(), TransportError> {
        let (remote_id, remote) = self.link(connection)?;
        let (_, remote_exchange) = self
            .network
            .endpoint(&remote)
            .ok_or_else(|| TransportError::ConnectionClosed(connection.clone()))?;
        remote_exchange.on_response(&remote_id, response);
        Ok(())
    }

    async fn close(&self, connection: &ConnectionId, reason: CloseReason) {
        let Some(link) = self.links.lock().remove(connection) else {
            return;
        };
        self.closed.lock().push((connection.clone(), reason));
        if let Some((_, own_exchange)) = self.network.endpoint(&self.me) {
            own_exchange.on_connection_closed(&link.info);
        }
        if let Some((remote_transport, remote_exchange)) = self.network.endpoint(&link.remote) {
            let remote_link = remote_transport.links.lock().remove(&link.remote_id);
            if let Some(remote_link) = remote_link {
                remote_exchange.on_connection_closed(&remote_link.info);
            }
        }
    }
}

struct Node {
    address: Address,
    transport: Arc<LoopbackTransport>,
    peer_group: Arc<PeerGroupService>,
    exchange: Arc<PeerExchangeService>,
    manager: Arc<PeerGroupManager>,
    metrics: Arc<PeerGroupMetrics>,
    ban_list: Arc<InMemoryBanList>,
    persistence: Arc<InMemoryPersistence<PeerStore>>,
    clock: Arc<ManualTimeSource>,
    _stop: watch::Sender<bool>,
}

struct NodeBuilder {
    port: u16,
    seeds: Vec<Address>,
    group: PeerGroupConfig,
    exchange: PeerExchangeConfig,
    persistence: Arc<InMemoryPersistence<PeerStore>>,
}

impl NodeBuilder {
    fn new(port: u16) -> Self {
        Self {
            port,
            seeds: Vec::new(),
            group: PeerGroupConfig::for_testing(),
            exchange: PeerExchangeConfig::for_testing(),
            persistence: Arc::new(InMemoryPersistence::new("peers_clear")),
        }
    }

    fn seeds(mut self, ports: &[u16]) -> Self {
        self.seeds = ports.iter().map(|p| Address::localhost(*p)).collect();
        self
    }

    fn group(mut self, group: PeerGroupConfig) -> Self {
        self.group = group;
        self
    }

    fn exchange(mut self, exchange: PeerExchangeConfig) -> Self {
        self.exchange = exchange;
        self
    }

    fn persistence(mut self, persistence: Arc<InMemoryPersistence<PeerStore>>) -> Self {
        self.persistence = persistence;
        self
    }

    fn build(self, network: &Arc<Network>) -> Node {
        let address = Address::localhost(self.port);
        let transport = Arc::new(LoopbackTransport::new(address.clone(), network.clone()));
        let ban_list = Arc::new(InMemoryBanList::new());
        let clock = Arc::new(ManualTimeSource::new(NOW));
        let (stop, shutdown) = watch::channel(false);
        let metrics = Arc::new(PeerGroupMetrics::default());
        let peer_group = Arc::new(PeerGroupService::new(
            self.group,
            transport.clone(),
            self.seeds,
            ban_list.clone(),
            self.persistence.clone(),
            clock.clone(),
        ));
        let exchange = Arc::new(PeerExchangeService::new(
            peer_group.clone(),
            self.exchange,
            transport.clone(),
            metrics.clone(),
            shutdown.clone(),
        ));
        let manager = Arc::new(PeerGroupManager::new(
            peer_group.clone(),
            exchange.clone(),
            transport.clone(),
            MaintenanceConfig::default(),
            metrics.clone(),
            shutdown,
        ));
        network.endpoints.lock().insert(
            address.clone(),
            Endpoint {
                transport: Arc::downgrade(&transport),
                exchange: Arc::downgrade(&exchange),
            },
        );
        Node {
            address,
            transport,
            peer_group,
            exchange,
            manager,
            metrics,
            ban_list,
            persistence: self.persistence,
            clock,
            _stop: stop,
        }
    }
}

fn addresses(peers: &[Peer]) -> Vec<Address> {
    let mut out: Vec<_> = peers.iter().map(|p| p.address.clone()).collect();
    out.sort();
    out
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
// TEST GROUP 1: Exchange
// =============================================================================

#[tokio::test]
async fn test_two_seeded_nodes_persist_each_other() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).seeds(&[2]).build(&network);
    let b = NodeBuilder::new(2).seeds(&[1]).build(&network);

    let (a_ok, _a_task) = a.manager.initialize().await;
    let (b_ok, _b_task) = b.manager.initialize().await;

    assert!(a_ok);
    assert!(b_ok);
    assert!(a.peer_group.is_persisted(&b.address));
    assert!(b.peer_group.is_persisted(&a.address));
    assert_ne!(a.exchange.state(), ExchangeState::Bootstrapping);
}

#[tokio::test]
async fn test_exchange_learns_peers_of_the_responder() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).seeds(&[2]).build(&network);
    let b = NodeBuilder::new(2).build(&network);
    let c = Address::localhost(3);
    b.peer_group
        .add_reported_peers(vec![Peer::new(c.clone(), true, NOW - 1000)]);

    let merged = a.exchange.exchange_with(&b.address).await.unwrap();

    assert_eq!(merged, 1);
    assert_eq!(addresses(&a.peer_group.reported_peers()), vec![c.clone()]);
    assert!(a.peer_group.is_persisted(&c));
    assert_eq!(b.metrics.snapshot().requests_served, 1);
}

#[tokio::test]
async fn test_responder_merges_requester_peers_and_skips_known_ones() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    let b = NodeBuilder::new(2).build(&network);
    let c = Address::localhost(3);
    let d = Address::localhost(4);
    a.peer_group
        .add_reported_peers(vec![Peer::new(c.clone(), true, NOW - 1000)]);
    b.peer_group.add_reported_peers(vec![
        Peer::new(c.clone(), true, NOW - 1000),
        Peer::new(d.clone(), true, NOW - 1000),
    ]);

    let merged = a.exchange.exchange_with(&b.address).await.unwrap();

    assert_eq!(merged, 1);
    assert_eq!(addresses(&a.peer_group.reported_peers()), vec![c.clone(), d]);
    assert!(b.peer_group.is_persisted(&c));
}

#[tokio::test]
async fn test_unreachable_seed_completes_with_false() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).seeds(&[9]).build(&network);

    let (ok, _task) = a.manager.initialize().await;

    assert!(!ok);
    assert_eq!(a.metrics.snapshot().exchanges_failed, 1);
    assert!(a.peer_group.persisted_peers().is_empty());
}

#[tokio::test]
async fn test_no_candidates_completes_with_false() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);

    assert!(!a.exchange.start_initial_exchange().await);
    assert_eq!(a.exchange.state(), ExchangeState::SteadyState);
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_times_out() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    let b = NodeBuilder::new(2).build(&network);
    b.transport.silent.store(true, Ordering::SeqCst);

    let result = a.exchange.exchange_with(&b.address).await;

    assert!(matches!(result, Err(PeerGroupError::Timeout { .. })));
    assert_eq!(a.exchange.num_pending_requests(), 0);
}

#[tokio::test]
async fn test_closing_connection_cancels_only_its_exchange() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1)
        .exchange(PeerExchangeConfig {
            request_timeout: Duration::from_secs(30),
            ..PeerExchangeConfig::for_testing()
        })
        .build(&network);
    let b = NodeBuilder::new(2).build(&network);
    let c = NodeBuilder::new(3).build(&network);
    b.transport.silent.store(true, Ordering::SeqCst);

    let exchange = a.exchange.clone();
    let b_address = b.address.clone();
    let pending = tokio::spawn(async move { exchange.exchange_with(&b_address).await });
    wait_until(|| a.exchange.num_pending_requests() == 1).await;

    let to_b = a
        .transport
        .connections()
        .into_iter()
        .find(|i| i.peer_address == b.address)
        .unwrap();
    a.transport.close(&to_b.id, CloseReason::Shutdown).await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(PeerGroupError::Cancelled(_))));
    assert!(a.exchange.exchange_with(&c.address).await.is_ok());
}

#[tokio::test]
async fn test_response_on_unknown_connection_is_ignored() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);

    let response = PeerExchangeResponse::new(7, Vec::new());
    assert!(!a.exchange.on_response(&ConnectionId::random(), response));
}

#[tokio::test]
async fn test_banned_peer_is_not_contacted() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    let b = NodeBuilder::new(2).build(&network);
    a.ban_list.ban(b.address.clone());

    let result = a.exchange.exchange_with(&b.address).await;

    assert!(matches!(result, Err(PeerGroupError::Banned(_))));
    assert!(a.transport.connections().is_empty());
}

// =============================================================================
// TEST GROUP 2: Strategy
// =============================================================================

#[tokio::test]
async fn test_merge_drops_seeds_banned_self_reporter_and_outdated() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).seeds(&[10]).build(&network);
    let banned = Address::localhost(11);
    a.ban_list.ban(banned.clone());
    let reporter = Address::localhost(12);
    let good = Address::localhost(13);

    let peers = vec![
        Peer::new(a.address.clone(), true, NOW),
        Peer::new(Address::localhost(10), true, NOW),
        Peer::new(banned, true, NOW),
        Peer::new(reporter.clone(), true, NOW),
        Peer::new(Address::localhost(14), true, NOW - 6 * DAY_MS),
        Peer::new(Address::new("", 0), true, NOW),
        Peer::new(good.clone(), true, NOW),
    ];
    let accepted = a.exchange.strategy().add_reported_peers(peers, &reporter);

    assert_eq!(accepted, 1);
    assert_eq!(addresses(&a.peer_group.reported_peers()), vec![good.clone()]);
    assert_eq!(addresses(&a.peer_group.persisted_peers()), vec![good]);
}

#[tokio::test]
async fn test_reporting_skips_requester_and_known_peers() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    let requester = Address::localhost(20);
    let known = Address::localhost(21);
    let fresh = Address::localhost(22);
    a.peer_group.add_reported_peers(vec![
        Peer::new(requester.clone(), true, NOW),
        Peer::new(known.clone(), true, NOW),
        Peer::new(fresh.clone(), true, NOW),
    ]);

    let reported = a
        .exchange
        .strategy()
        .peers_for_reporting(Some(&requester), &[Peer::new(known, true, NOW)]);

    assert_eq!(addresses(&reported), vec![fresh]);
}

#[tokio::test]
async fn test_reporting_disabled_sends_nothing() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1)
        .exchange(PeerExchangeConfig {
            support_peer_reporting: false,
            ..PeerExchangeConfig::for_testing()
        })
        .build(&network);
    a.peer_group
        .add_reported_peers(vec![Peer::new(Address::localhost(20), true, NOW)]);

    assert!(a.exchange.strategy().peers_for_reporting(None, &[]).is_empty());
}

#[tokio::test]
async fn test_used_addresses_skipped_until_exhausted() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).seeds(&[10]).build(&network);
    let strategy = a.exchange.strategy();

    assert_eq!(strategy.addresses_for_initial_exchange(), vec![Address::localhost(10)]);
    assert!(strategy.addresses_for_initial_exchange().is_empty());
    assert_eq!(strategy.addresses_for_initial_exchange(), vec![Address::localhost(10)]);
}

#[tokio::test]
async fn test_extension_falls_back_to_seeds() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).seeds(&[10]).build(&network);
    assert_eq!(
        a.exchange.strategy().addresses_for_extension(),
        vec![Address::localhost(10)]
    );

    a.peer_group
        .add_reported_peers(vec![Peer::new(Address::localhost(20), true, NOW)]);
    a.exchange.strategy().reset_used_addresses();
    assert_eq!(
        a.exchange.strategy().addresses_for_extension(),
        vec![Address::localhost(20)]
    );
}

// =============================================================================
// TEST GROUP 3: Maintenance and persistence
// =============================================================================

#[tokio::test]
async fn test_house_keeping_closes_newest_excess_connections() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    let peers: Vec<Node> = (10..16).map(|p| NodeBuilder::new(p).build(&network)).collect();
    let mut opened = Vec::new();
    for peer in &peers {
        opened.push(a.transport.connect(&peer.address).await.unwrap());
    }

    let report = a.manager.house_keeping().await;

    let max = PeerGroupConfig::for_testing().max_num_connected_peers;
    assert_eq!(a.transport.connections().len(), max);
    let closed: Vec<_> = report.closed.iter().map(|(id, _)| id.clone()).collect();
    let newest: Vec<_> = opened[max..].iter().map(|i| i.id.clone()).collect();
    assert_eq!(closed, newest);
    assert!(report
        .closed
        .iter()
        .all(|(_, reason)| *reason == CloseReason::TooManyConnections));
    assert!(!report.extended);
}

#[tokio::test]
async fn test_house_keeping_closes_banned_and_duplicate_connections() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    let b = NodeBuilder::new(2).build(&network);
    let c = NodeBuilder::new(3).build(&network);
    let first = a.transport.open(&b.address).unwrap();
    let second = a.transport.open(&b.address).unwrap();
    let to_c = a.transport.open(&c.address).unwrap();
    a.ban_list.ban(c.address.clone());

    let report = a.manager.house_keeping().await;

    assert!(report.closed.contains(&(to_c.id, CloseReason::Banned)));
    assert!(report
        .closed
        .contains(&(second.id, CloseReason::DuplicateConnection)));
    let open: Vec<_> = a.transport.connections().into_iter().map(|i| i.id).collect();
    assert_eq!(open, vec![first.id]);
    assert_eq!(a.transport.closed().len(), 2);
}

#[tokio::test]
async fn test_house_keeping_limits_seed_connections() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).seeds(&[2, 3, 4]).build(&network);
    let _seeds: Vec<Node> = (2..5).map(|p| NodeBuilder::new(p).build(&network)).collect();
    for port in 2..5 {
        a.transport.connect(&Address::localhost(port)).await.unwrap();
    }

    let report = a.manager.house_keeping().await;

    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].1, CloseReason::TooManyConnectionsToSeeds);
}

#[tokio::test]
async fn test_house_keeping_prunes_outdated_peers() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    a.peer_group
        .add_reported_peers(vec![Peer::new(Address::localhost(20), true, NOW)]);
    a.clock.advance(6 * DAY_MS);

    let report = a.manager.house_keeping().await;

    assert_eq!(report.pruned, 1);
    assert!(a.peer_group.reported_peers().is_empty());
    assert_eq!(a.metrics.snapshot().peers_pruned, 1);
}

#[tokio::test]
async fn test_house_keeping_extends_when_below_minimum() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1).build(&network);
    let b = NodeBuilder::new(2).build(&network);
    a.peer_group
        .add_reported_peers(vec![Peer::new(b.address.clone(), true, NOW)]);

    let report = a.manager.house_keeping().await;

    assert!(report.extended);
    wait_until(|| !a.exchange.is_extending()).await;
    assert_eq!(a.transport.connections().len(), 1);
}

#[tokio::test]
async fn test_persisted_peers_survive_restart() {
    let network = Arc::new(Network::default());
    let persistence = Arc::new(InMemoryPersistence::new("peers_clear"));
    let a = NodeBuilder::new(1)
        .persistence(persistence.clone())
        .build(&network);
    a.peer_group
        .add_persisted_peers(vec![Peer::new(Address::localhost(20), true, NOW)]);
    a.peer_group.flush().await.unwrap();
    assert_eq!(a.persistence.current().unwrap().persisted.len(), 1);

    let restarted = NodeBuilder::new(5)
        .persistence(persistence)
        .build(&network);
    assert_eq!(restarted.peer_group.load_persisted().await.unwrap(), 1);
    assert_eq!(
        addresses(&restarted.peer_group.persisted_peers()),
        vec![Address::localhost(20)]
    );
}

#[tokio::test]
async fn test_bounded_views_respected_by_merge() {
    let network = Arc::new(Network::default());
    let a = NodeBuilder::new(1)
        .group(PeerGroupConfig {
            max_reported: 3,
            max_persisted: 3,
            ..PeerGroupConfig::for_testing()
        })
        .build(&network);
    let peers = (100..110)
        .map(|p| Peer::new(Address::localhost(p), true, NOW - u64::from(p)))
        .collect();

    a.exchange
        .strategy()
        .add_reported_peers(peers, &Address::localhost(99));

    assert_eq!(a.peer_group.reported_peers().len(), 3);
    assert_eq!(a.peer_group.persisted_peers().len(), 3);
}
