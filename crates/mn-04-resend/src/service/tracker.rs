//! # Resend Tracker
//!
//! Keeps outbound confidential messages until their delivery is settled.
//!
//! | Status | Effect |
//! |---|---|
//! | `Connecting` | insert, persist |
//! | `Failed` | remove, persist |
//! | anything else | none |
//!
//! The pending set has its own lock and never waits on a data store.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_persistence::RateLimitedPersister;
use shared_types::{MessageDeliveryStatus, TimeSource};
use tracing::{debug, info, warn};

use super::config::ResendConfig;
use super::metrics::{ResendMetrics, ResendMetricsSnapshot};
use crate::domain::{ResendError, ResendMessageData, ResendStore, StatusTransition};
use crate::ports::{ConfidentialSender, ResendPersistence};

pub struct ResendTracker {
    config: ResendConfig,
    store: Arc<Mutex<ResendStore>>,
    persistence: ResendPersistence,
    persister: RateLimitedPersister<ResendStore>,
    clock: Arc<dyn TimeSource>,
    metrics: ResendMetrics,
}

impl ResendTracker {
    pub fn new(config: ResendConfig, persistence: ResendPersistence, clock: Arc<dyn TimeSource>) -> Self {
        let store = Arc::new(Mutex::new(ResendStore::default()));
        let snapshot_source = store.clone();
        let persister = RateLimitedPersister::new(persistence.clone(), config.persist_interval, move || {
            snapshot_source.lock().clone()
        });
        Self {
            config,
            store,
            persistence,
            persister,
            clock,
            metrics: ResendMetrics::default(),
        }
    }

    /// Load the persisted set, dropping expired records. Returns the number
    /// of pending messages.
    pub async fn initialize(&self) -> Result<usize, ResendError> {
        let Some(mut persisted) = self.persistence.load().await? else {
            return Ok(0);
        };
        let pruned = persisted.prune(self.clock.now_millis(), self.config.max_age_ms());
        let pending = persisted.messages.len();
        *self.store.lock() = persisted;
        if pruned > 0 {
            self.metrics.record_pruned(pruned);
            self.persister.request_persist();
        }
        info!(pending, pruned, "Resend messages restored");
        Ok(pending)
    }

    // =========================================================================
    // STATUS EVENTS
    // =========================================================================

    pub fn handle(&self, data: &ResendMessageData) {
        let changed = self.store.lock().apply(data);
        match StatusTransition::of(data.status) {
            StatusTransition::Insert => {
                self.metrics.record_inserted();
                debug!(message_id = %data.message_id, "Tracking message for resend");
            }
            StatusTransition::Remove if changed => {
                self.metrics.record_removed();
                debug!(message_id = %data.message_id, "Message failed, no longer tracked");
            }
            _ => {}
        }
        if changed {
            self.persister.request_persist();
        }
    }

    /// Status update for an already tracked message.
    pub fn on_delivery_status(&self, message_id: &str, status: MessageDeliveryStatus) {
        let existing = self.store.lock().messages.get(message_id).cloned();
        match existing {
            Some(data) => self.handle(&data.with_status(status)),
            None => debug!(message_id, ?status, "Status for untracked message"),
        }
    }

    // =========================================================================
    // RESENDING
    // =========================================================================

    pub fn num_resends(&self, message_id: &str) -> u32 {
        self.store.lock().num_resends(message_id)
    }

    pub fn can_manually_resend(&self, message_id: &str) -> bool {
        let store = self.store.lock();
        store.messages.contains_key(message_id)
            && store.num_resends(message_id) < self.config.max_manual_resends
    }

    /// User triggered resend, limited to `max_manual_resends` per message.
    pub async fn manual_resend(
        &self,
        message_id: &str,
        sender: &dyn ConfidentialSender,
    ) -> Result<(), ResendError> {
        let data = self.claim(message_id, self.config.max_manual_resends)?;
        info!(message_id, "Resending message");
        sender.resend(&data).await?;
        self.metrics.record_resent();
        Ok(())
    }

    /// Pending messages still allowed an automatic resend. Each returned
    /// message counts as resent.
    pub fn pending_for_replay(&self) -> Vec<ResendMessageData> {
        let limit = self.config.max_auto_resends;
        let mut store = self.store.lock();
        let ids: Vec<String> = store.messages.keys().cloned().collect();
        let mut out = Vec::new();
        for id in ids {
            if store.try_count_resend(&id, limit) {
                if let Some(data) = store.messages.get(&id) {
                    out.push(data.clone());
                }
            } else {
                self.metrics.record_refused();
            }
        }
        drop(store);
        if !out.is_empty() {
            self.persister.request_persist();
        }
        out
    }

    /// Hand every replayable message to `sender`. Returns how many were sent.
    pub async fn replay_pending(&self, sender: &dyn ConfidentialSender) -> usize {
        let mut sent = 0;
        for data in self.pending_for_replay() {
            match sender.resend(&data).await {
                Ok(()) => {
                    sent += 1;
                    self.metrics.record_resent();
                }
                Err(e) => warn!(message_id = %data.message_id, error = %e, "Replaying message failed"),
            }
        }
        if sent > 0 {
            info!(sent, "Replayed pending messages");
        }
        sent
    }

    fn claim(&self, message_id: &str, limit: u32) -> Result<ResendMessageData, ResendError> {
        let mut store = self.store.lock();
        let data = store
            .messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| ResendError::UnknownMessage(message_id.to_string()))?;
        if !store.try_count_resend(message_id, limit) {
            self.metrics.record_refused();
            return Err(ResendError::ResendLimitReached {
                message_id: message_id.to_string(),
                limit,
            });
        }
        drop(store);
        self.persister.request_persist();
        Ok(data)
    }

    // =========================================================================
    // QUERIES AND MAINTENANCE
    // =========================================================================

    pub fn contains(&self, message_id: &str) -> bool {
        self.store.lock().messages.contains_key(message_id)
    }

    pub fn get(&self, message_id: &str) -> Option<ResendMessageData> {
        self.store.lock().messages.get(message_id).cloned()
    }

    pub fn pending(&self) -> Vec<ResendMessageData> {
        self.store.lock().messages.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.store.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop records older than `max_age`.
    pub fn prune_persisted(&self) -> usize {
        let pruned = self
            .store
            .lock()
            .prune(self.clock.now_millis(), self.config.max_age_ms());
        if pruned > 0 {
            self.metrics.record_pruned(pruned);
            self.persister.request_persist();
        }
        pruned
    }

    pub async fn flush(&self) -> Result<(), ResendError> {
        Ok(self.persister.flush().await?)
    }

    pub fn metrics(&self) -> ResendMetricsSnapshot {
        self.metrics.snapshot()
    }
}
