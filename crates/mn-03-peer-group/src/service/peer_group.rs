//! # Peer Group Service
//!
//! Owns the peer arena of one transport, the seed set and the ban list
//! checks. Reported and persisted peers are written through a rate-limited
//! persister after every change.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use shared_persistence::RateLimitedPersister;
use shared_types::{Address, ConnectionInfo, TimeSource, TransportType};
use tracing::{debug, info};

use super::config::PeerGroupConfig;
use crate::domain::{Peer, PeerArena, PeerGroupError, PeerStore, PeerView};
use crate::ports::{BanList, PeerGroupPersistence, PeerTransport};

pub struct PeerGroupService {
    config: PeerGroupConfig,
    transport: Arc<dyn PeerTransport>,
    seeds: RwLock<BTreeSet<Address>>,
    ban_list: Arc<dyn BanList>,
    arena: Arc<Mutex<PeerArena>>,
    persistence: PeerGroupPersistence,
    persister: RateLimitedPersister<PeerStore>,
    clock: Arc<dyn TimeSource>,
}

impl PeerGroupService {
    pub fn new(
        config: PeerGroupConfig,
        transport: Arc<dyn PeerTransport>,
        seeds: impl IntoIterator<Item = Address>,
        ban_list: Arc<dyn BanList>,
        persistence: PeerGroupPersistence,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let arena = Arc::new(Mutex::new(PeerArena::new(
            config.max_reported,
            config.max_persisted,
        )));
        let snapshot_source = arena.clone();
        let persister = RateLimitedPersister::new(persistence.clone(), config.persist_interval, move || {
            snapshot_source.lock().snapshot()
        });
        Self {
            config,
            transport,
            seeds: RwLock::new(seeds.into_iter().collect()),
            ban_list,
            arena,
            persistence,
            persister,
            clock,
        }
    }

    pub fn config(&self) -> &PeerGroupConfig {
        &self.config
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport.transport_type()
    }

    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Restore reported and persisted peers. Returns the persisted count.
    pub async fn load_persisted(&self) -> Result<usize, PeerGroupError> {
        let Some(store) = self.persistence.load().await? else {
            return Ok(0);
        };
        let mut arena = self.arena.lock();
        arena.restore(store);
        let persisted = arena.len(PeerView::Persisted);
        info!(
            transport = %self.transport_type(),
            reported = arena.len(PeerView::Reported),
            persisted,
            "Peers restored"
        );
        Ok(persisted)
    }

    pub async fn flush(&self) -> Result<(), PeerGroupError> {
        Ok(self.persister.flush().await?)
    }

    // =========================================================================
    // SEEDS, BANS, SELF
    // =========================================================================

    pub fn seeds(&self) -> Vec<Address> {
        self.seeds.read().iter().cloned().collect()
    }

    pub fn add_seed(&self, address: Address) {
        self.seeds.write().insert(address);
    }

    pub fn remove_seed(&self, address: &Address) -> bool {
        self.seeds.write().remove(address)
    }

    pub fn is_seed(&self, address: &Address) -> bool {
        self.seeds.read().contains(address)
    }

    pub fn is_banned(&self, address: &Address) -> bool {
        self.ban_list.is_banned(address)
    }

    pub fn is_myself(&self, address: &Address) -> bool {
        self.transport.my_address().as_ref() == Some(address)
    }

    /// Eligible for reporting, merging and dialing as a regular peer.
    pub fn is_valid_non_seed(&self, address: &Address) -> bool {
        address.is_valid()
            && address.transport_type() == self.transport_type()
            && !self.is_seed(address)
            && !self.is_banned(address)
            && !self.is_myself(address)
    }

    pub fn is_outdated(&self, peer: &Peer) -> bool {
        peer.is_outdated(self.now(), self.config.max_peer_age_ms)
    }

    /// Seeds other than ourselves and not banned, shuffled.
    pub fn shuffled_seeds(&self) -> Vec<Address> {
        let mut seeds: Vec<_> = self
            .seeds()
            .into_iter()
            .filter(|a| !self.is_myself(a) && !self.is_banned(a))
            .collect();
        seeds.shuffle(&mut rand::thread_rng());
        seeds
    }

    // =========================================================================
    // VIEWS
    // =========================================================================

    pub fn reported_peers(&self) -> Vec<Peer> {
        self.arena.lock().peers(PeerView::Reported)
    }

    pub fn persisted_peers(&self) -> Vec<Peer> {
        self.arena.lock().peers(PeerView::Persisted)
    }

    pub fn connected_peers(&self) -> Vec<Peer> {
        self.arena.lock().peers(PeerView::Connected)
    }

    pub fn is_persisted(&self, address: &Address) -> bool {
        self.arena.lock().contains(PeerView::Persisted, address)
    }

    pub fn add_reported_peers(&self, peers: impl IntoIterator<Item = Peer>) -> bool {
        let mut arena = self.arena.lock();
        let mut changed = false;
        for peer in peers {
            changed |= arena.add(PeerView::Reported, peer);
        }
        drop(arena);
        if changed {
            self.persister.request_persist();
        }
        changed
    }

    pub fn add_persisted_peers(&self, peers: impl IntoIterator<Item = Peer>) -> bool {
        let mut arena = self.arena.lock();
        let mut changed = false;
        for peer in peers {
            changed |= arena.add(PeerView::Persisted, peer);
        }
        drop(arena);
        if changed {
            self.persister.request_persist();
        }
        changed
    }

    pub fn remove_reported_peers(&self, addresses: &[Address]) {
        let mut arena = self.arena.lock();
        for address in addresses {
            arena.remove(PeerView::Reported, address);
        }
        drop(arena);
        self.persister.request_persist();
    }

    pub fn remove_persisted_peers(&self, addresses: &[Address]) {
        let mut arena = self.arena.lock();
        for address in addresses {
            arena.remove(PeerView::Persisted, address);
        }
        drop(arena);
        self.persister.request_persist();
    }

    pub fn clear_reported_peers(&self) {
        self.arena.lock().clear(PeerView::Reported);
        self.persister.request_persist();
    }

    pub fn clear_persisted_peers(&self) {
        self.arena.lock().clear(PeerView::Persisted);
        self.persister.request_persist();
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// A handshake completed: the peer is connected and worth remembering.
    pub fn on_connection(&self, connection: &ConnectionInfo) {
        let address = &connection.peer_address;
        let peer = Peer::new(address.clone(), connection.is_outbound(), self.now());
        let promote = address.is_valid() && !self.is_banned(address) && !self.is_myself(address);
        let mut arena = self.arena.lock();
        arena.add(PeerView::Connected, peer.clone());
        if promote {
            arena.add(PeerView::Persisted, peer);
        }
        drop(arena);
        if promote {
            self.persister.request_persist();
        }
        debug!(peer = %address, "Peer connected");
    }

    pub fn on_connection_closed(&self, connection: &ConnectionInfo) {
        let address = &connection.peer_address;
        let still_connected = self
            .transport
            .connections()
            .iter()
            .any(|c| c.id != connection.id && &c.peer_address == address);
        if !still_connected {
            self.arena.lock().remove(PeerView::Connected, address);
        }
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.transport.connections()
    }

    pub fn num_connections(&self) -> usize {
        self.transport.connections().len()
    }

    pub fn num_outbound_connections(&self) -> usize {
        self.transport
            .connections()
            .iter()
            .filter(|c| c.is_outbound())
            .count()
    }

    pub fn target_num_connected_peers(&self) -> usize {
        self.config.target_num_connected_peers()
    }

    pub fn needs_more_connections(&self) -> bool {
        self.num_connections() < self.target_num_connected_peers()
    }

    pub fn needs_more_reported_peers(&self) -> bool {
        self.arena.lock().len(PeerView::Reported) < self.config.min_num_reported_peers
    }

    // =========================================================================
    // HOUSE KEEPING
    // =========================================================================

    /// Drop outdated peers and trim the bounded views. Returns how many
    /// view memberships were removed.
    pub fn prune(&self) -> usize {
        let now = self.now();
        let mut arena = self.arena.lock();
        let mut removed = arena.prune_outdated(now, self.config.max_peer_age_ms);
        removed += arena
            .evict_exceeding(PeerView::Reported, self.config.max_reported)
            .len();
        removed += arena
            .evict_exceeding(PeerView::Persisted, self.config.max_persisted)
            .len();
        drop(arena);
        if removed > 0 {
            self.persister.request_persist();
        }
        removed
    }
}
