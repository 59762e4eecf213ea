//! Waiting table for storage reporting round trips.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use mn_01_data_storage::StorageReport;
use parking_lot::Mutex;
use shared_types::ConnectionId;
use tokio::sync::oneshot;

type Key = (ConnectionId, u32);

#[derive(Default)]
pub struct ReportRequests {
    next_id: AtomicU32,
    pending: Arc<Mutex<HashMap<Key, oneshot::Sender<StorageReport>>>>,
}

/// Removes its entry when the caller stops waiting.
pub struct ReportGuard {
    key: Key,
    pending: Arc<Mutex<HashMap<Key, oneshot::Sender<StorageReport>>>>,
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}

impl ReportRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        connection: &ConnectionId,
    ) -> (u32, oneshot::Receiver<StorageReport>, ReportGuard) {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = (connection.clone(), request_id);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(key.clone(), tx);
        let guard = ReportGuard {
            key,
            pending: self.pending.clone(),
        };
        (request_id, rx, guard)
    }

    /// Deliver a response. False when nobody waits for it on `connection`.
    pub fn resolve(&self, connection: &ConnectionId, request_id: u32, report: StorageReport) -> bool {
        let sender = self.pending.lock().remove(&(connection.clone(), request_id));
        match sender {
            Some(sender) => sender.send(report).is_ok(),
            None => false,
        }
    }

    /// Drop every waiter of a closed connection. Their receivers error out.
    pub fn cancel_connection(&self, connection: &ConnectionId) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|(id, _), _| id != connection);
        before - pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_only_on_the_requesting_connection() {
        let requests = ReportRequests::new();
        let a = ConnectionId::new("a");
        let (id, rx, _guard) = requests.register(&a);

        assert!(!requests.resolve(&ConnectionId::new("b"), id, StorageReport::default()));
        assert!(requests.resolve(&a, id, StorageReport::default()));
        assert_eq!(rx.await.unwrap(), StorageReport::default());
    }

    #[tokio::test]
    async fn test_guard_and_close_clean_up() {
        let requests = ReportRequests::new();
        let a = ConnectionId::new("a");
        let (_, _rx, guard) = requests.register(&a);
        drop(guard);
        assert!(requests.is_empty());

        let (_, rx, _guard) = requests.register(&a);
        assert_eq!(requests.cancel_connection(&a), 1);
        assert!(rx.await.is_err());
    }
}
