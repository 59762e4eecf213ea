//! # Peer Exchange Strategy
//!
//! Chooses which addresses to contact in each exchange round and which
//! peers to hand out or merge. Addresses already contacted are skipped
//! until every candidate has been used once.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use shared_types::Address;
use tracing::debug;

use super::config::PeerExchangeConfig;
use super::peer_group::PeerGroupService;
use crate::domain::policy::exchange_limit;
use crate::domain::{newest_first, Peer, MAX_EXCHANGED_PEERS};

/// Upper bound of the random age added to connected peers before they are
/// reported.
const CONNECTED_PEER_JITTER_MS: u64 = 3000;

pub struct PeerExchangeStrategy {
    peer_group: Arc<PeerGroupService>,
    config: PeerExchangeConfig,
    used_addresses: Mutex<HashSet<Address>>,
}

impl PeerExchangeStrategy {
    pub fn new(peer_group: Arc<PeerGroupService>, config: PeerExchangeConfig) -> Self {
        Self {
            peer_group,
            config,
            used_addresses: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &PeerExchangeConfig {
        &self.config
    }

    pub fn reset_used_addresses(&self) {
        self.used_addresses.lock().clear();
    }

    // =========================================================================
    // CANDIDATES
    // =========================================================================

    /// Seeds, then reported, persisted and connected peers.
    pub fn addresses_for_initial_exchange(&self) -> Vec<Address> {
        let limit = self.limit();
        let mut out = self.pick(self.seed_candidates(), self.config.num_seed_nodes_at_bootstrap);
        out.extend(self.pick(self.reported_candidates(), self.config.num_reported_peers_at_bootstrap));
        out.extend(self.pick(self.persisted_candidates(), self.config.num_persisted_peers_at_bootstrap));
        out.extend(self.pick(self.connected_candidates(), limit));
        self.finish(out, usize::MAX)
    }

    pub fn addresses_for_retry(&self) -> Vec<Address> {
        let limit = self.limit();
        let mut out = self.pick(self.seed_candidates(), self.config.num_seed_nodes_at_bootstrap);
        out.extend(self.pick(self.reported_candidates(), limit));
        out.extend(self.pick(self.connected_candidates(), limit));
        self.finish(out, usize::MAX)
    }

    /// Reported and persisted peers. Seeds only when there are none.
    pub fn addresses_for_extension(&self) -> Vec<Address> {
        let limit = self.limit();
        let mut out = self.pick(self.reported_candidates(), limit);
        out.extend(self.pick(self.persisted_candidates(), limit));
        if out.is_empty() {
            out = self.pick(self.seed_candidates(), self.config.num_seed_nodes_at_bootstrap);
        }
        self.finish(out, limit)
    }

    fn limit(&self) -> usize {
        let config = self.peer_group.config();
        exchange_limit(
            config.min_num_connected_peers,
            self.peer_group.target_num_connected_peers(),
            self.peer_group.num_connections(),
            self.peer_group.reported_peers().len(),
            self.config.num_reported_peers_at_bootstrap,
        )
        .max(1)
    }

    fn seed_candidates(&self) -> Vec<Address> {
        self.peer_group.shuffled_seeds()
    }

    fn reported_candidates(&self) -> Vec<Address> {
        self.non_seed_addresses(self.peer_group.reported_peers())
    }

    fn persisted_candidates(&self) -> Vec<Address> {
        self.non_seed_addresses(self.peer_group.persisted_peers())
    }

    fn connected_candidates(&self) -> Vec<Address> {
        self.peer_group
            .connected_peers()
            .into_iter()
            .map(|p| p.address)
            .filter(|a| !self.peer_group.is_banned(a) && !self.peer_group.is_myself(a))
            .collect()
    }

    fn non_seed_addresses(&self, peers: Vec<Peer>) -> Vec<Address> {
        peers
            .into_iter()
            .filter(|p| !self.peer_group.is_outdated(p))
            .map(|p| p.address)
            .filter(|a| self.peer_group.is_valid_non_seed(a))
            .collect()
    }

    fn pick(&self, candidates: Vec<Address>, limit: usize) -> Vec<Address> {
        let used = self.used_addresses.lock();
        candidates
            .into_iter()
            .filter(|a| !used.contains(a))
            .take(limit)
            .collect()
    }

    /// Dedup, cap, mark used. An empty result clears the used set so the
    /// next round can start over.
    fn finish(&self, candidates: Vec<Address>, limit: usize) -> Vec<Address> {
        let mut seen = HashSet::new();
        let out: Vec<Address> = candidates
            .into_iter()
            .filter(|a| seen.insert(a.clone()))
            .take(limit)
            .collect();
        let mut used = self.used_addresses.lock();
        if out.is_empty() {
            used.clear();
        } else {
            used.extend(out.iter().cloned());
        }
        out
    }

    // =========================================================================
    // REPORTING AND MERGING
    // =========================================================================

    /// Peers handed to `requester`. Connected peers come first with a small
    /// random age so connection times are not revealed.
    pub fn peers_for_reporting(&self, requester: Option<&Address>, known: &[Peer]) -> Vec<Peer> {
        if !self.config.support_peer_reporting {
            return Vec::new();
        }
        let now = self.peer_group.now();
        let known: HashSet<&Address> = known.iter().map(|p| &p.address).collect();
        let eligible = |peer: &Peer| {
            Some(&peer.address) != requester
                && !known.contains(&peer.address)
                && self.peer_group.is_valid_non_seed(&peer.address)
                && !self.peer_group.is_outdated(peer)
        };

        let mut rng = rand::thread_rng();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for peer in self.peer_group.connected_peers() {
            let jitter = rng.gen_range(0..CONNECTED_PEER_JITTER_MS);
            let peer = Peer::new(peer.address, peer.is_outbound, now.saturating_sub(jitter));
            if eligible(&peer) && seen.insert(peer.address.clone()) {
                out.push(peer);
            }
        }
        for peer in self.peer_group.reported_peers() {
            if out.len() >= MAX_EXCHANGED_PEERS {
                break;
            }
            if eligible(&peer) && seen.insert(peer.address.clone()) {
                out.push(peer);
            }
        }
        out.truncate(MAX_EXCHANGED_PEERS);
        out
    }

    /// Merge peers received from `reporter` into the reported and persisted
    /// views. Returns how many were accepted.
    pub fn add_reported_peers(&self, peers: Vec<Peer>, reporter: &Address) -> usize {
        let mut accepted: Vec<Peer> = peers
            .into_iter()
            .filter(|p| &p.address != reporter)
            .filter(|p| self.peer_group.is_valid_non_seed(&p.address))
            .filter(|p| !self.peer_group.is_outdated(p))
            .collect();
        accepted.sort_by(newest_first);
        accepted.truncate(MAX_EXCHANGED_PEERS);

        let count = accepted.len();
        if count > 0 {
            self.peer_group.add_reported_peers(accepted.clone());
            self.peer_group.add_persisted_peers(accepted);
        }
        debug!(%reporter, count, "Merged reported peers");
        count
    }

    pub fn needs_more_connections(&self) -> bool {
        self.peer_group.needs_more_connections()
    }

    pub fn needs_more_reported_peers(&self) -> bool {
        self.peer_group.needs_more_reported_peers()
    }
}
