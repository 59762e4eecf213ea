//! Outbound persistence port.

use crate::errors::PersistenceError;
use async_trait::async_trait;

/// Durable home of one snapshot of type `T`.
#[async_trait]
pub trait PersistenceStore<T: Send + 'static>: Send + Sync {
    /// Load the last stored snapshot. `Ok(None)` when nothing was stored yet.
    async fn load(&self) -> Result<Option<T>, PersistenceError>;

    /// Atomically replace the stored snapshot.
    async fn store(&self, snapshot: T) -> Result<(), PersistenceError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}
