//! # Test Harness
//!
//! Builds nodes with short timeouts and in-memory persistence, each
//! listening on the shared hub under `127.0.0.1:<port>`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mn_01_data_storage::{
    AddAppendOnlyDataRequest, AddAuthenticatedDataRequest, DataPayload, DataRequest, DataStorageApi,
    DistributedData, MetaData, DAY_MS,
};
use node_runtime::{MemoryHub, NodeConfig, NodeRuntime, PersistenceBackend};
use shared_crypto::Ed25519KeyPair;
use shared_types::{Address, SystemTimeSource};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(10);

pub fn node_config(port: u16, seeds: &[u16]) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.network.listen_port = port;
    config.network.seeds = seeds.iter().map(|p| format!("127.0.0.1:{p}")).collect();
    config.network.handshake_timeout_secs = 2;
    config.network.request_timeout_secs = 5;
    config.storage.in_memory = true;
    config.storage.persist_interval_ms = 50;
    config.inventory.request_timeout_secs = 5;
    config.peers.request_timeout_secs = 2;
    config.peers.bootstrap_timeout_secs = 2;
    config.peers.house_keeping_interval_secs = 1;
    config.monitor.initial_delay_secs = 1;
    config.monitor.interval_secs = 1;
    config.monitor.metrics_interval_secs = 1;
    config
}

pub struct TestNode {
    pub runtime: NodeRuntime,
    pub address: Address,
    listener: JoinHandle<()>,
}

impl TestNode {
    /// Build a node and start accepting links. Services start with
    /// [`NodeRuntime::start`].
    pub fn build(hub: &Arc<MemoryHub>, config: NodeConfig) -> Self {
        let address = config.listen_address().expect("valid listen address");
        let runtime = NodeRuntime::new(
            config,
            hub.dialer(),
            &PersistenceBackend::InMemory,
            Arc::new(SystemTimeSource),
        )
        .expect("node builds");
        let listener = MemoryHub::serve(runtime.network().clone(), hub.listen(address.clone()));
        Self {
            runtime,
            address,
            listener,
        }
    }

    pub fn holds(&self, request: &DataRequest) -> bool {
        self.runtime.services().storage.all_entries().contains(request)
    }

    pub fn num_entries(&self) -> usize {
        self.runtime.services().storage.storage_report().total_entries
    }

    pub fn is_connected_to(&self, other: &TestNode) -> bool {
        self.runtime.network().connection_to(&other.address).is_some()
    }

    pub async fn stop(self, hub: &MemoryHub) {
        hub.unlisten(&self.address);
        self.runtime.shutdown().await;
        let _ = self.listener.await;
    }
}

/// Start every node concurrently so initial exchanges find their seeds up.
pub async fn start_all(nodes: &[&TestNode]) {
    let reports = join_all(nodes.iter().map(|node| node.runtime.start())).await;
    for report in reports {
        report.expect("node starts");
    }
}

/// Poll `condition` until it holds or `WAIT` elapses.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

// =============================================================================
// DATA FIXTURES
// =============================================================================

pub fn note(content: &[u8]) -> DataRequest {
    DataRequest::AddAppendOnly(AddAppendOnlyDataRequest::new(DataPayload::new(
        "Note",
        MetaData::new("Witness", 0),
        content.to_vec(),
    )))
}

pub fn offer(content: &[u8], sequence_number: u32, owner: &Ed25519KeyPair) -> DataRequest {
    let data = DistributedData::Authenticated(DataPayload::new(
        "Offer",
        MetaData::new("Offer", DAY_MS),
        content.to_vec(),
    ));
    DataRequest::AddAuthenticated(AddAuthenticatedDataRequest::create(
        data,
        sequence_number,
        shared_types::time::now_millis(),
        owner,
    ))
}
