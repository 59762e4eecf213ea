//! # In-Memory Transport Hub
//!
//! Connects nodes living in one process. Each node listens on an address;
//! dialing hands the listener one end of a pair of unbounded channels.
//! Dropping a sender reads as EOF on the other end, like a closed socket.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Address, TransportError};
use tokio::sync::mpsc;
use tracing::debug;

use super::network::{Dialer, Link, NodeNetwork};

#[derive(Default)]
pub struct MemoryHub {
    listeners: Mutex<HashMap<Address, mpsc::UnboundedSender<Link>>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Accept links for `address`. A second listener replaces the first.
    pub fn listen(&self, address: Address) -> mpsc::UnboundedReceiver<Link> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().insert(address, tx);
        rx
    }

    /// Stop accepting links for `address`.
    pub fn unlisten(&self, address: &Address) -> bool {
        self.listeners.lock().remove(address).is_some()
    }

    /// Hand every accepted link of `listener` to `network` until the hub
    /// stops listening on that address.
    pub fn serve(network: Arc<NodeNetwork>, mut listener: mpsc::UnboundedReceiver<Link>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(link) = listener.recv().await {
                network.accept(link);
            }
            debug!(address = %network.my_address(), "Memory listener stopped");
        })
    }

    /// Dialer bound to this hub.
    pub fn dialer(self: &Arc<Self>) -> Arc<MemoryDialer> {
        Arc::new(MemoryDialer { hub: self.clone() })
    }

    fn open(&self, address: &Address) -> Result<Link, TransportError> {
        let listener = self
            .listeners
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::ConnectionFailed {
                address: address.clone(),
                reason: "no listener".to_string(),
            })?;

        let (to_remote, remote_incoming) = mpsc::unbounded_channel();
        let (to_local, local_incoming) = mpsc::unbounded_channel();
        listener
            .send(Link {
                outgoing: to_local,
                incoming: remote_incoming,
            })
            .map_err(|_| TransportError::ConnectionFailed {
                address: address.clone(),
                reason: "listener stopped".to_string(),
            })?;
        Ok(Link {
            outgoing: to_remote,
            incoming: local_incoming,
        })
    }
}

pub struct MemoryDialer {
    hub: Arc<MemoryHub>,
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self, address: &Address) -> Result<Link, TransportError> {
        self.hub.open(address)
    }
}
