//! Storage service configuration.

use std::time::Duration;

use crate::domain::StoreCatalog;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Minimum time between two writes of the same store.
    pub persist_interval: Duration,
    /// Period of the expiry pruning task.
    pub prune_interval: Duration,
    /// Stores this node hosts and their pinned parameters.
    pub catalog: StoreCatalog,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist_interval: Duration::from_secs(1),
            prune_interval: Duration::from_secs(60),
            catalog: StoreCatalog::default(),
        }
    }
}

impl StorageConfig {
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            persist_interval: Duration::from_millis(10),
            prune_interval: Duration::from_millis(100),
            catalog: StoreCatalog::default(),
        }
    }
}
