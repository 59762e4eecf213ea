//! # Inventory Requester
//!
//! Sends inventory requests and pairs responses with their waiters.
//!
//! Flow:
//! 1. `request()` registers a one-shot waiter under a fresh nonce
//! 2. The request goes out on the connection
//! 3. `on_response()` removes the waiter and resolves it
//! 4. The caller gets the inventory, or a timeout/cancellation error
//!
//! The waiter is removed when the request future ends for any reason, and
//! `on_connection_closed()` cancels every waiter of that connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shared_types::ConnectionId;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::{DataFilter, Inventory, InventoryError, InventoryRequest, InventoryResponse};
use crate::ports::InventoryTransport;

struct Waiter {
    connection: ConnectionId,
    sender: oneshot::Sender<InventoryResponse>,
}

/// Waiting table keyed by nonce.
#[derive(Clone, Default)]
pub struct PendingRequests {
    waiters: Arc<Mutex<HashMap<u32, Waiter>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `connection`. Dropping the guard deregisters it.
    pub fn register(
        &self,
        connection: ConnectionId,
    ) -> (u32, oneshot::Receiver<InventoryResponse>, PendingGuard) {
        let (sender, receiver) = oneshot::channel();
        let mut waiters = self.waiters.lock();
        let mut nonce = rand::random::<u32>();
        while waiters.contains_key(&nonce) {
            nonce = rand::random::<u32>();
        }
        waiters.insert(nonce, Waiter { connection, sender });
        let guard = PendingGuard {
            waiters: self.waiters.clone(),
            nonce,
        };
        (nonce, receiver, guard)
    }

    /// Resolve the waiter for `response`. Responses with an unknown nonce or
    /// from another connection are ignored.
    pub fn resolve(&self, connection: &ConnectionId, response: InventoryResponse) -> bool {
        let mut waiters = self.waiters.lock();
        let matches = waiters
            .get(&response.request_nonce)
            .is_some_and(|w| &w.connection == connection);
        if !matches {
            return false;
        }
        match waiters.remove(&response.request_nonce) {
            Some(waiter) => waiter.sender.send(response).is_ok(),
            None => false,
        }
    }

    /// Cancel every waiter of `connection`. Returns how many were dropped.
    pub fn cancel_connection(&self, connection: &ConnectionId) -> usize {
        let mut waiters = self.waiters.lock();
        let before = waiters.len();
        waiters.retain(|_, w| &w.connection != connection);
        before - waiters.len()
    }

    pub fn has_pending(&self, connection: &ConnectionId) -> bool {
        self.waiters.lock().values().any(|w| &w.connection == connection)
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its waiter on drop.
pub struct PendingGuard {
    waiters: Arc<Mutex<HashMap<u32, Waiter>>>,
    nonce: u32,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.waiters.lock().remove(&self.nonce);
    }
}

pub struct InventoryRequester {
    transport: Arc<dyn InventoryTransport>,
    pending: PendingRequests,
    timeout: Duration,
}

impl InventoryRequester {
    pub fn new(transport: Arc<dyn InventoryTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            pending: PendingRequests::new(),
            timeout,
        }
    }

    /// One round trip on `connection`.
    pub async fn request(
        &self,
        connection: &ConnectionId,
        data_filter: DataFilter,
    ) -> Result<Inventory, InventoryError> {
        let (nonce, receiver, _guard) = self.pending.register(connection.clone());
        debug!(%connection, nonce, filter_entries = data_filter.len(), "Sending inventory request");
        self.transport
            .send_request(connection, InventoryRequest { data_filter, nonce })
            .await?;

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(response)) => Ok(response.inventory),
            Ok(Err(_)) => Err(InventoryError::Cancelled(connection.clone())),
            Err(_) => {
                warn!(%connection, nonce, "Inventory request timed out");
                Err(InventoryError::Timeout {
                    connection: connection.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }

    pub fn on_response(&self, connection: &ConnectionId, response: InventoryResponse) -> bool {
        let nonce = response.request_nonce;
        let resolved = self.pending.resolve(connection, response);
        if !resolved {
            debug!(%connection, nonce, "Inventory response without waiter");
        }
        resolved
    }

    pub fn on_connection_closed(&self, connection: &ConnectionId) {
        let cancelled = self.pending.cancel_connection(connection);
        if cancelled > 0 {
            debug!(%connection, cancelled, "Cancelled inventory requests of closed connection");
        }
    }

    pub fn has_pending(&self, connection: &ConnectionId) -> bool {
        self.pending.has_pending(connection)
    }

    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(nonce: u32) -> InventoryResponse {
        InventoryResponse {
            inventory: Inventory::default(),
            request_nonce: nonce,
        }
    }

    #[tokio::test]
    async fn test_resolve_delivers_and_deregisters() {
        let pending = PendingRequests::new();
        let conn = ConnectionId::new("a");
        let (nonce, receiver, _guard) = pending.register(conn.clone());
        assert!(pending.has_pending(&conn));

        assert!(pending.resolve(&conn, response(nonce)));
        assert_eq!(receiver.await.unwrap().request_nonce, nonce);
        assert!(pending.is_empty());
        assert!(!pending.resolve(&conn, response(nonce)));
    }

    #[tokio::test]
    async fn test_response_from_other_connection_ignored() {
        let pending = PendingRequests::new();
        let (nonce, _receiver, _guard) = pending.register(ConnectionId::new("a"));
        assert!(!pending.resolve(&ConnectionId::new("b"), response(nonce)));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_connection_fails_waiter() {
        let pending = PendingRequests::new();
        let conn = ConnectionId::new("a");
        let (_nonce, receiver, _guard) = pending.register(conn.clone());
        let (_other, _other_rx, _other_guard) = pending.register(ConnectionId::new("b"));

        assert_eq!(pending.cancel_connection(&conn), 1);
        assert!(receiver.await.is_err());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_guard_drop_deregisters() {
        let pending = PendingRequests::new();
        let (_nonce, _receiver, guard) = pending.register(ConnectionId::new("a"));
        drop(guard);
        assert!(pending.is_empty());
    }
}
