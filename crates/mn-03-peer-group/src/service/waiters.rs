//! Outstanding peer exchange requests, keyed by nonce.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::ConnectionId;
use tokio::sync::oneshot;

use crate::domain::PeerExchangeResponse;

struct Waiter {
    connection: ConnectionId,
    sender: oneshot::Sender<PeerExchangeResponse>,
}

#[derive(Clone, Default)]
pub struct ExchangeWaiters {
    waiters: Arc<Mutex<HashMap<u32, Waiter>>>,
}

impl ExchangeWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `connection`. Dropping the guard deregisters it.
    pub fn register(
        &self,
        connection: ConnectionId,
    ) -> (u32, oneshot::Receiver<PeerExchangeResponse>, WaiterGuard) {
        let (sender, receiver) = oneshot::channel();
        let mut waiters = self.waiters.lock();
        let mut nonce = rand::random::<u32>();
        while waiters.contains_key(&nonce) {
            nonce = rand::random::<u32>();
        }
        waiters.insert(nonce, Waiter { connection, sender });
        let guard = WaiterGuard {
            waiters: self.waiters.clone(),
            nonce,
        };
        (nonce, receiver, guard)
    }

    /// False for unknown nonces and for responses arriving on another
    /// connection than the request went out on.
    pub fn resolve(&self, connection: &ConnectionId, response: PeerExchangeResponse) -> bool {
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

    pub fn cancel_connection(&self, connection: &ConnectionId) -> usize {
        let mut waiters = self.waiters.lock();
        let before = waiters.len();
        waiters.retain(|_, w| &w.connection != connection);
        before - waiters.len()
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct WaiterGuard {
    waiters: Arc<Mutex<HashMap<u32, Waiter>>>,
    nonce: u32,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.waiters.lock().remove(&self.nonce);
    }
}
