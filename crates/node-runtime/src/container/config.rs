//! # Node Configuration
//!
//! Unified configuration for every service plus the runtime parameters.
//!
//! Sources, later ones win:
//!
//! 1. Built-in defaults
//! 2. TOML file named by `MN_CONFIG_FILE`
//! 3. `MN_*` environment variables
//!
//! Service configs carry `Duration`s; the sections here keep plain numbers
//! so they read naturally in TOML and convert on demand.

use std::path::PathBuf;
use std::time::Duration;

use mn_01_data_storage::{StorageConfig, StoreCatalog};
use mn_02_inventory::InventoryConfig;
use mn_03_peer_group::{MaintenanceConfig, PeerExchangeConfig, PeerGroupConfig};
use mn_04_resend::ResendConfig;
use mn_05_network_load::NetworkLoadConfig;
use serde::{Deserialize, Serialize};
use shared_crypto::Ed25519KeyPair;
use shared_types::{Address, DataHash};
use thiserror::Error;

const DAY_SECS: u64 = 24 * 60 * 60;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub storage: StorageSettings,
    pub inventory: InventorySettings,
    pub peers: PeerSettings,
    pub resend: ResendSettings,
    pub monitor: MonitorSettings,
    pub security: SecurityConfig,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.into(),
        }
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host other peers reach us on.
    pub listen_host: String,
    pub listen_port: u16,
    /// Seed nodes as `host:port`. May include our own address.
    pub seeds: Vec<String>,
    /// Addresses we never talk to.
    pub banned: Vec<String>,
    pub handshake_timeout_secs: u64,
    /// Timeout of storage reporting round trips.
    pub request_timeout_secs: u64,
    pub max_frame_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 9999,
            seeds: Vec::new(),
            banned: Vec::new(),
            handshake_timeout_secs: 10,
            request_timeout_secs: 90,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root of the `db/` tree.
    pub data_dir: PathBuf,
    /// Keep everything in memory. Used by simulations and tests.
    pub in_memory: bool,
    pub persist_interval_ms: u64,
    pub prune_interval_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            in_memory: false,
            persist_interval_ms: 1000,
            prune_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    pub max_size_in_kb: usize,
    pub request_timeout_secs: u64,
    pub max_pending_requests_at_startup: usize,
    pub max_pending_requests_at_periodic: usize,
    pub min_completed_requests: usize,
    pub repeat_request_interval_secs: u64,
    pub use_bloom_filter: bool,
}

impl Default for InventorySettings {
    fn default() -> Self {
        let defaults = InventoryConfig::default();
        Self {
            max_size_in_kb: defaults.max_size_in_kb,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            max_pending_requests_at_startup: defaults.max_pending_requests_at_startup,
            max_pending_requests_at_periodic: defaults.max_pending_requests_at_periodic,
            min_completed_requests: defaults.min_completed_requests,
            repeat_request_interval_secs: defaults.repeat_request_interval.as_secs(),
            use_bloom_filter: defaults.use_bloom_filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    pub min_num_connected_peers: usize,
    pub min_num_outbound_connected_peers: usize,
    pub max_num_connected_peers: usize,
    pub min_num_reported_peers: usize,
    pub support_peer_reporting: bool,
    pub request_timeout_secs: u64,
    pub bootstrap_timeout_secs: u64,
    pub house_keeping_interval_secs: u64,
    pub max_seeds: usize,
}

impl Default for PeerSettings {
    fn default() -> Self {
        let group = PeerGroupConfig::default();
        let exchange = PeerExchangeConfig::default();
        let maintenance = MaintenanceConfig::default();
        Self {
            min_num_connected_peers: group.min_num_connected_peers,
            min_num_outbound_connected_peers: group.min_num_outbound_connected_peers,
            max_num_connected_peers: group.max_num_connected_peers,
            min_num_reported_peers: group.min_num_reported_peers,
            support_peer_reporting: exchange.support_peer_reporting,
            request_timeout_secs: exchange.request_timeout.as_secs(),
            bootstrap_timeout_secs: exchange.bootstrap_timeout.as_secs(),
            house_keeping_interval_secs: maintenance.house_keeping_interval.as_secs(),
            max_seeds: maintenance.max_seeds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResendSettings {
    pub max_age_days: u64,
    pub max_manual_resends: u32,
    pub max_auto_resends: u32,
}

impl Default for ResendSettings {
    fn default() -> Self {
        let defaults = ResendConfig::default();
        Self {
            max_age_days: defaults.max_age.as_secs() / DAY_SECS,
            max_manual_resends: defaults.max_manual_resends,
            max_auto_resends: defaults.max_auto_resends,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
    /// How often service counters are copied into the Prometheus registry.
    pub metrics_interval_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let defaults = NetworkLoadConfig::default();
        Self {
            initial_delay_secs: defaults.initial_delay.as_secs(),
            interval_secs: defaults.interval.as_secs(),
            metrics_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hex hash-160 of the keys allowed to publish authorized data.
    pub authorized_key_hashes: Vec<String>,
    /// Hex seed of the node key. A fresh key is generated when unset.
    pub node_key_seed: Option<String>,
}

// =============================================================================
// LOADING
// =============================================================================

impl NodeConfig {
    /// Parse a TOML document. Missing sections and fields keep their defaults.
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(document)?)
    }

    /// Apply `MN_*` overrides looked up through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("MN_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("MN_IN_MEMORY") {
            self.storage.in_memory = parse_flag("MN_IN_MEMORY", &flag)?;
        }
        if let Some(host) = lookup("MN_LISTEN_HOST") {
            self.network.listen_host = host;
        }
        if let Some(port) = lookup("MN_LISTEN_PORT") {
            self.network.listen_port = parse_number("MN_LISTEN_PORT", &port)?;
        }
        if let Some(seeds) = lookup("MN_SEEDS") {
            self.network.seeds = split_list(&seeds);
        }
        if let Some(banned) = lookup("MN_BANNED") {
            self.network.banned = split_list(&banned);
        }
        if let Some(secs) = lookup("MN_REQUEST_TIMEOUT_SECS") {
            let secs = parse_number("MN_REQUEST_TIMEOUT_SECS", &secs)?;
            self.network.request_timeout_secs = secs;
            self.inventory.request_timeout_secs = secs;
            self.peers.request_timeout_secs = secs;
        }
        if let Some(secs) = lookup("MN_BOOTSTRAP_TIMEOUT_SECS") {
            self.peers.bootstrap_timeout_secs = parse_number("MN_BOOTSTRAP_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("MN_HOUSE_KEEPING_INTERVAL_SECS") {
            self.peers.house_keeping_interval_secs =
                parse_number("MN_HOUSE_KEEPING_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("MN_INVENTORY_INTERVAL_SECS") {
            self.inventory.repeat_request_interval_secs =
                parse_number("MN_INVENTORY_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("MN_MONITOR_INTERVAL_SECS") {
            self.monitor.interval_secs = parse_number("MN_MONITOR_INTERVAL_SECS", &secs)?;
        }
        if let Some(flag) = lookup("MN_USE_BLOOM_FILTER") {
            self.inventory.use_bloom_filter = parse_flag("MN_USE_BLOOM_FILTER", &flag)?;
        }
        if let Some(seed) = lookup("MN_NODE_KEY") {
            self.security.node_key_seed = Some(seed);
        }
        if let Some(keys) = lookup("MN_AUTHORIZED_KEYS") {
            self.security.authorized_key_hashes = split_list(&keys);
        }
        Ok(())
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let peers = &self.peers;
        if peers.min_num_connected_peers > peers.max_num_connected_peers {
            return Err(ConfigError::Inconsistent(format!(
                "min_num_connected_peers ({}) exceeds max_num_connected_peers ({})",
                peers.min_num_connected_peers, peers.max_num_connected_peers
            )));
        }
        if peers.min_num_outbound_connected_peers > peers.max_num_connected_peers {
            return Err(ConfigError::Inconsistent(format!(
                "min_num_outbound_connected_peers ({}) exceeds max_num_connected_peers ({})",
                peers.min_num_outbound_connected_peers, peers.max_num_connected_peers
            )));
        }
        if self.network.listen_port == 0 {
            return Err(ConfigError::invalid("network.listen_port", "0"));
        }
        self.listen_address()?;
        if self.seed_addresses()?.is_empty() {
            return Err(ConfigError::Inconsistent(
                "no seed nodes configured for the clear-net transport".to_string(),
            ));
        }
        self.banned_addresses()?;
        self.authorized_key_hashes()?;
        self.node_key()?;

        let timeouts = [
            ("network.request_timeout_secs", self.network.request_timeout_secs),
            ("network.handshake_timeout_secs", self.network.handshake_timeout_secs),
            ("inventory.request_timeout_secs", self.inventory.request_timeout_secs),
            ("peers.request_timeout_secs", self.peers.request_timeout_secs),
            ("peers.house_keeping_interval_secs", self.peers.house_keeping_interval_secs),
            ("monitor.interval_secs", self.monitor.interval_secs),
            ("monitor.metrics_interval_secs", self.monitor.metrics_interval_secs),
        ];
        if let Some((key, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::invalid(key, "0"));
        }
        Ok(())
    }

    // =========================================================================
    // DERIVED VALUES
    // =========================================================================

    pub fn listen_address(&self) -> Result<Address, ConfigError> {
        let address = Address::new(self.network.listen_host.clone(), self.network.listen_port);
        if !address.is_valid() {
            return Err(ConfigError::invalid("network.listen_host", self.network.listen_host.clone()));
        }
        Ok(address)
    }

    pub fn seed_addresses(&self) -> Result<Vec<Address>, ConfigError> {
        parse_addresses("network.seeds", &self.network.seeds)
    }

    pub fn banned_addresses(&self) -> Result<Vec<Address>, ConfigError> {
        parse_addresses("network.banned", &self.network.banned)
    }

    pub fn authorized_key_hashes(&self) -> Result<Vec<DataHash>, ConfigError> {
        self.security
            .authorized_key_hashes
            .iter()
            .map(|encoded| {
                hex::decode(encoded)
                    .ok()
                    .and_then(|bytes| DataHash::from_slice(&bytes).ok())
                    .ok_or_else(|| ConfigError::invalid("security.authorized_key_hashes", encoded.clone()))
            })
            .collect()
    }

    /// Node key from the configured seed, if any.
    pub fn node_key(&self) -> Result<Option<Ed25519KeyPair>, ConfigError> {
        let Some(encoded) = &self.security.node_key_seed else {
            return Ok(None);
        };
        let bytes = hex::decode(encoded)
            .map_err(|_| ConfigError::invalid("security.node_key_seed", "<redacted>"))?;
        Ed25519KeyPair::from_seed_slice(&bytes)
            .map(Some)
            .map_err(|_| ConfigError::invalid("security.node_key_seed", "<redacted>"))
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            persist_interval: Duration::from_millis(self.storage.persist_interval_ms),
            prune_interval: Duration::from_secs(self.storage.prune_interval_secs),
            catalog: StoreCatalog::default(),
        }
    }

    pub fn inventory_config(&self) -> InventoryConfig {
        let settings = &self.inventory;
        InventoryConfig {
            max_size_in_kb: settings.max_size_in_kb,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            max_pending_requests_at_startup: settings.max_pending_requests_at_startup,
            max_pending_requests_at_periodic: settings.max_pending_requests_at_periodic,
            min_completed_requests: settings.min_completed_requests,
            repeat_request_interval: Duration::from_secs(settings.repeat_request_interval_secs),
            use_bloom_filter: settings.use_bloom_filter,
            ..InventoryConfig::default()
        }
    }

    pub fn peer_group_config(&self) -> PeerGroupConfig {
        let settings = &self.peers;
        PeerGroupConfig {
            min_num_connected_peers: settings.min_num_connected_peers,
            min_num_outbound_connected_peers: settings.min_num_outbound_connected_peers,
            max_num_connected_peers: settings.max_num_connected_peers,
            min_num_reported_peers: settings.min_num_reported_peers,
            persist_interval: Duration::from_millis(self.storage.persist_interval_ms),
            ..PeerGroupConfig::default()
        }
    }

    pub fn peer_exchange_config(&self) -> PeerExchangeConfig {
        PeerExchangeConfig {
            support_peer_reporting: self.peers.support_peer_reporting,
            request_timeout: Duration::from_secs(self.peers.request_timeout_secs),
            bootstrap_timeout: Duration::from_secs(self.peers.bootstrap_timeout_secs),
            ..PeerExchangeConfig::default()
        }
    }

    pub fn maintenance_config(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            house_keeping_interval: Duration::from_secs(self.peers.house_keeping_interval_secs),
            max_seeds: self.peers.max_seeds,
        }
    }

    pub fn resend_config(&self) -> ResendConfig {
        ResendConfig {
            max_age: Duration::from_secs(self.resend.max_age_days.saturating_mul(DAY_SECS)),
            max_manual_resends: self.resend.max_manual_resends,
            max_auto_resends: self.resend.max_auto_resends,
            persist_interval: Duration::from_millis(self.storage.persist_interval_ms),
        }
    }

    pub fn network_load_config(&self) -> NetworkLoadConfig {
        NetworkLoadConfig {
            initial_delay: Duration::from_secs(self.monitor.initial_delay_secs),
            interval: Duration::from_secs(self.monitor.interval_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.network.handshake_timeout_secs)
    }
}

/// Load configuration from `MN_CONFIG_FILE` and the environment.
pub fn load_config() -> Result<NodeConfig, ConfigError> {
    let mut config = match std::env::var("MN_CONFIG_FILE") {
        Ok(path) => {
            let path = PathBuf::from(path);
            let document = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path, source })?;
            NodeConfig::from_toml(&document)?
        }
        Err(_) => NodeConfig::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::invalid(key, value))
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

fn parse_addresses(key: &'static str, values: &[String]) -> Result<Vec<Address>, ConfigError> {
    values
        .iter()
        .map(|value| value.parse().map_err(|_| ConfigError::invalid(key, value.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn seeded() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.network.seeds = vec!["127.0.0.1:9999".to_string()];
        config
    }

    #[test]
    fn test_defaults_match_service_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.peer_group_config().max_num_connected_peers, 12);
        assert_eq!(config.inventory_config().max_size_bytes(), 2000 * 1024);
        assert_eq!(config.resend_config().max_age, ResendConfig::default().max_age);
        assert_eq!(config.network_load_config().interval, Duration::from_secs(180));
    }

    #[test]
    fn test_default_config_needs_seeds() {
        assert!(NodeConfig::default().validate().is_err());
        assert!(seeded().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_min_above_max() {
        let mut config = seeded();
        config.peers.min_num_connected_peers = 20;
        assert!(matches!(config.validate(), Err(ConfigError::Inconsistent(_))));
    }

    #[test]
    fn test_validate_rejects_bad_seed() {
        let mut config = seeded();
        config.network.seeds.push("not-an-address".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "network.seeds", .. })
        ));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = NodeConfig::from_toml(
            r#"
            [network]
            listen_port = 7000
            seeds = ["10.0.0.1:7000", "10.0.0.2:7000"]

            [inventory]
            use_bloom_filter = true
            "#,
        )
        .unwrap();
        assert_eq!(config.network.listen_port, 7000);
        assert_eq!(config.seed_addresses().unwrap().len(), 2);
        assert!(config.inventory_config().use_bloom_filter);
        assert_eq!(config.peers, PeerSettings::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MN_LISTEN_PORT", "8001"),
            ("MN_SEEDS", "127.0.0.1:8001, 127.0.0.1:8002"),
            ("MN_REQUEST_TIMEOUT_SECS", "5"),
            ("MN_IN_MEMORY", "yes"),
        ]);
        let mut config = NodeConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.listen_address().unwrap(), Address::localhost(8001));
        assert_eq!(config.seed_addresses().unwrap().len(), 2);
        assert_eq!(config.inventory_config().request_timeout, Duration::from_secs(5));
        assert_eq!(config.peer_exchange_config().request_timeout, Duration::from_secs(5));
        assert!(config.storage.in_memory);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = NodeConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "MN_LISTEN_PORT").then(|| "eighty".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "MN_LISTEN_PORT", .. })
        ));
    }

    #[test]
    fn test_node_key_from_seed() {
        let mut config = seeded();
        let key = Ed25519KeyPair::generate();
        config.security.node_key_seed = Some(hex::encode(key.to_seed()));
        let loaded = config.node_key().unwrap().unwrap();
        assert_eq!(loaded.public_key(), key.public_key());
    }

    #[test]
    fn test_authorized_key_hashes() {
        let mut config = seeded();
        config.security.authorized_key_hashes = vec![hex::encode([3u8; 20])];
        assert_eq!(config.authorized_key_hashes().unwrap().len(), 1);

        config.security.authorized_key_hashes.push("abcd".to_string());
        assert!(config.validate().is_err());
    }
}
