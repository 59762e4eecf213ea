//! # Service Container
//!
//! Builds every service from a [`NodeConfig`] in dependency order and holds
//! them for the message router and the runtime.
//!
//! ```text
//! Level 0: clock, event bus, bonded roles, authorization verifier
//! Level 1: data storage
//! Level 2: inventory, peer group (+ exchange, maintenance), resend tracker
//! Level 3: network load monitor
//! ```

pub mod config;

pub use config::{load_config, ConfigError, NodeConfig};

use std::collections::BTreeMap;
use std::sync::Arc;

use mn_01_data_storage::{AuthorizationVerifier, BondedRoleRegistry, StorageEvent, StorageService};
use mn_02_inventory::InventoryService;
use mn_03_peer_group::{
    InMemoryBanList, PeerExchangeService, PeerGroupManager, PeerGroupMetrics, PeerGroupService,
};
use mn_04_resend::ResendTracker;
use mn_05_network_load::{ConnectionMetricsSource, NetworkLoadMonitor, NetworkLoadSnapshot};
use shared_bus::InMemoryEventBus;
use shared_crypto::Ed25519KeyPair;
use shared_types::{NetworkId, TimeSource};
use tokio::sync::watch;
use tracing::info;

use crate::adapters::{NodeNetwork, PersistenceBackend};

pub struct ServiceContainer {
    pub config: NodeConfig,
    pub clock: Arc<dyn TimeSource>,
    pub network: Arc<NodeNetwork>,
    pub node_key: Ed25519KeyPair,
    pub network_id: NetworkId,
    pub events: Arc<InMemoryEventBus<StorageEvent>>,
    pub storage: Arc<StorageService>,
    pub inventory: Arc<InventoryService>,
    pub ban_list: Arc<InMemoryBanList>,
    pub peer_metrics: Arc<PeerGroupMetrics>,
    pub peer_group: Arc<PeerGroupManager>,
    pub resend: Arc<ResendTracker>,
    pub network_load: Arc<NetworkLoadMonitor>,
}

impl ServiceContainer {
    pub fn new(
        config: NodeConfig,
        network: Arc<NodeNetwork>,
        backend: &PersistenceBackend,
        clock: Arc<dyn TimeSource>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ConfigError> {
        let node_key = config.node_key()?.unwrap_or_else(Ed25519KeyPair::generate);
        let my_address = network.my_address().clone();
        let network_id = NetworkId::new(
            BTreeMap::from([(my_address.transport_type(), my_address.clone())]),
            node_key.public_key().as_bytes().to_vec(),
        );

        // Level 0
        let events = Arc::new(InMemoryEventBus::new());
        let bonded_roles = Arc::new(BondedRoleRegistry::new());
        let verifier = Arc::new(AuthorizationVerifier::new(
            config.authorized_key_hashes()?,
            bonded_roles.clone(),
        ));

        // Level 1
        let storage = Arc::new(StorageService::new(
            config.storage_config(),
            backend.store_provider(),
            verifier,
            bonded_roles,
            clock.clone(),
            events.clone(),
        ));

        // Level 2
        let inventory = Arc::new(InventoryService::new(
            config.inventory_config(),
            storage.clone(),
            network.clone(),
            shutdown.clone(),
        ));

        let ban_list = Arc::new(InMemoryBanList::new());
        for address in config.banned_addresses()? {
            ban_list.ban(address);
        }
        let peer_metrics = Arc::new(PeerGroupMetrics::default());
        let group = Arc::new(PeerGroupService::new(
            config.peer_group_config(),
            network.clone(),
            config.seed_addresses()?,
            ban_list.clone(),
            backend.peers(my_address.transport_type()),
            clock.clone(),
        ));
        let exchange = Arc::new(PeerExchangeService::new(
            group.clone(),
            config.peer_exchange_config(),
            network.clone(),
            peer_metrics.clone(),
            shutdown.clone(),
        ));
        let peer_group = Arc::new(PeerGroupManager::new(
            group,
            exchange,
            network.clone(),
            config.maintenance_config(),
            peer_metrics.clone(),
            shutdown.clone(),
        ));

        let resend = Arc::new(ResendTracker::new(
            config.resend_config(),
            backend.resend_messages(),
            clock.clone(),
        ));

        // Level 3
        let traffic: Arc<dyn ConnectionMetricsSource> = network.clone();
        let network_load = Arc::new(NetworkLoadMonitor::new(
            config.network_load_config(),
            vec![traffic],
            storage.clone(),
            Arc::new(NetworkLoadSnapshot::new()),
            clock.clone(),
            shutdown,
        ));

        info!(address = %my_address, "Services built");
        Ok(Self {
            config,
            clock,
            network,
            node_key,
            network_id,
            events,
            storage,
            inventory,
            ban_list,
            peer_metrics,
            peer_group,
            resend,
            network_load,
        })
    }
}
