//! # Outbound Ports (Driven Ports)
//!
//! Production: the node runtime sends confidential messages over the
//! transport of the receiver's address.

use std::sync::Arc;

use async_trait::async_trait;
use shared_persistence::PersistenceStore;
use shared_types::TransportError;

use crate::domain::{ResendMessageData, ResendStore};

pub type ResendPersistence = Arc<dyn PersistenceStore<ResendStore>>;

/// Sends a pending message again.
#[async_trait]
pub trait ConfidentialSender: Send + Sync {
    async fn resend(&self, data: &ResendMessageData) -> Result<(), TransportError>;
}
