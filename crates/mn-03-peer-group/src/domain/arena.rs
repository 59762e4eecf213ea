//! # Peer Arena
//!
//! One record per address, indexed by the views it belongs to:
//!
//! | View | Source | Bounded | Persisted |
//! |------|--------|---------|-----------|
//! | Reported | peer exchange | yes | yes |
//! | Persisted | successful connections, exchange | yes | yes |
//! | Connected | live connections | no | no |
//!
//! A record lives while any view references it. Bounded views evict their
//! oldest peers first, never a connected one.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use shared_types::Address;

use super::peer::{newest_first, Peer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerView {
    Reported,
    Persisted,
    Connected,
}

/// Durable part of the arena.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStore {
    pub reported: Vec<Peer>,
    pub persisted: Vec<Peer>,
}

#[derive(Debug, Clone)]
pub struct PeerArena {
    records: HashMap<Address, Peer>,
    reported: HashSet<Address>,
    persisted: HashSet<Address>,
    connected: HashSet<Address>,
    max_reported: usize,
    max_persisted: usize,
}

impl PeerArena {
    pub fn new(max_reported: usize, max_persisted: usize) -> Self {
        Self {
            records: HashMap::new(),
            reported: HashSet::new(),
            persisted: HashSet::new(),
            connected: HashSet::new(),
            max_reported,
            max_persisted,
        }
    }

    fn index(&self, view: PeerView) -> &HashSet<Address> {
        match view {
            PeerView::Reported => &self.reported,
            PeerView::Persisted => &self.persisted,
            PeerView::Connected => &self.connected,
        }
    }

    fn index_mut(&mut self, view: PeerView) -> &mut HashSet<Address> {
        match view {
            PeerView::Reported => &mut self.reported,
            PeerView::Persisted => &mut self.persisted,
            PeerView::Connected => &mut self.connected,
        }
    }

    fn capacity(&self, view: PeerView) -> Option<usize> {
        match view {
            PeerView::Reported => Some(self.max_reported),
            PeerView::Persisted => Some(self.max_persisted),
            PeerView::Connected => None,
        }
    }

    /// Add `peer` to `view`. The shared record keeps the newest `created`.
    /// Returns whether the view or the record changed.
    pub fn add(&mut self, view: PeerView, peer: Peer) -> bool {
        let address = peer.address.clone();
        let record_changed = match self.records.get_mut(&address) {
            Some(existing) if peer.created > existing.created => {
                *existing = peer;
                true
            }
            Some(_) => false,
            None => {
                self.records.insert(address.clone(), peer);
                true
            }
        };
        let inserted = self.index_mut(view).insert(address);
        if let Some(max) = self.capacity(view) {
            self.evict_exceeding(view, max);
        }
        inserted || record_changed
    }

    pub fn remove(&mut self, view: PeerView, address: &Address) -> bool {
        let removed = self.index_mut(view).remove(address);
        if removed {
            self.collect(address);
        }
        removed
    }

    pub fn clear(&mut self, view: PeerView) {
        let addresses: Vec<_> = self.index_mut(view).drain().collect();
        for address in &addresses {
            self.collect(address);
        }
    }

    pub fn contains(&self, view: PeerView, address: &Address) -> bool {
        self.index(view).contains(address)
    }

    pub fn len(&self, view: PeerView) -> usize {
        self.index(view).len()
    }

    pub fn get(&self, address: &Address) -> Option<&Peer> {
        self.records.get(address)
    }

    /// Peers of `view`, newest first.
    pub fn peers(&self, view: PeerView) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self
            .index(view)
            .iter()
            .filter_map(|a| self.records.get(a).cloned())
            .collect();
        peers.sort_by(newest_first);
        peers
    }

    /// Drop the oldest non-connected peers until `view` holds at most `max`.
    pub fn evict_exceeding(&mut self, view: PeerView, max: usize) -> Vec<Address> {
        let excess = self.len(view).saturating_sub(max);
        if excess == 0 {
            return Vec::new();
        }
        let mut candidates: Vec<Peer> = self
            .peers(view)
            .into_iter()
            .filter(|p| !self.connected.contains(&p.address))
            .collect();
        // Oldest at the end.
        let keep = candidates.len().saturating_sub(excess);
        let evicted: Vec<Address> = candidates.drain(keep..).map(|p| p.address).collect();
        for address in &evicted {
            self.remove(view, address);
        }
        evicted
    }

    /// Drop outdated peers from the bounded views. Connected peers stay.
    pub fn prune_outdated(&mut self, now: u64, max_age_ms: u64) -> usize {
        let outdated: Vec<Address> = self
            .records
            .values()
            .filter(|p| p.is_outdated(now, max_age_ms) && !self.connected.contains(&p.address))
            .map(|p| p.address.clone())
            .collect();
        let mut removed = 0;
        for address in &outdated {
            removed += usize::from(self.remove(PeerView::Reported, address));
            removed += usize::from(self.remove(PeerView::Persisted, address));
        }
        removed
    }

    pub fn snapshot(&self) -> PeerStore {
        PeerStore {
            reported: self.peers(PeerView::Reported),
            persisted: self.peers(PeerView::Persisted),
        }
    }

    /// Replace the bounded views with `store`. Connected peers are kept.
    pub fn restore(&mut self, store: PeerStore) {
        self.clear(PeerView::Reported);
        self.clear(PeerView::Persisted);
        for peer in store.reported {
            self.add(PeerView::Reported, peer);
        }
        for peer in store.persisted {
            self.add(PeerView::Persisted, peer);
        }
    }

    fn collect(&mut self, address: &Address) {
        if !self.reported.contains(address)
            && !self.persisted.contains(address)
            && !self.connected.contains(address)
        {
            self.records.remove(address);
        }
    }
}
