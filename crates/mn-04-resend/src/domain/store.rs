//! Durable state of the resend tracker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::MessageDeliveryStatus;

use super::message::ResendMessageData;

/// What a delivery status does to the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    Insert,
    Remove,
    Unchanged,
}

impl StatusTransition {
    /// Intermediate states say nothing about final delivery, so they leave
    /// the record in place.
    pub fn of(status: MessageDeliveryStatus) -> Self {
        match status {
            MessageDeliveryStatus::Connecting => StatusTransition::Insert,
            MessageDeliveryStatus::Failed => StatusTransition::Remove,
            MessageDeliveryStatus::Sent
            | MessageDeliveryStatus::AckReceived
            | MessageDeliveryStatus::TryAddToMailbox
            | MessageDeliveryStatus::AddedToMailbox
            | MessageDeliveryStatus::MailboxMsgReceived => StatusTransition::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendStore {
    pub messages: BTreeMap<String, ResendMessageData>,
    pub num_resends: BTreeMap<String, u32>,
}

impl ResendStore {
    /// Apply `status` for `data`. Returns true when the set changed.
    pub fn apply(&mut self, data: &ResendMessageData) -> bool {
        match StatusTransition::of(data.status) {
            StatusTransition::Insert => {
                self.messages.insert(data.message_id.clone(), data.clone());
                true
            }
            StatusTransition::Remove => self.remove(&data.message_id),
            StatusTransition::Unchanged => false,
        }
    }

    pub fn remove(&mut self, message_id: &str) -> bool {
        self.num_resends.remove(message_id);
        self.messages.remove(message_id).is_some()
    }

    pub fn num_resends(&self, message_id: &str) -> u32 {
        self.num_resends.get(message_id).copied().unwrap_or(0)
    }

    /// Count one more resend unless `limit` was reached.
    pub fn try_count_resend(&mut self, message_id: &str, limit: u32) -> bool {
        let count = self.num_resends.entry(message_id.to_string()).or_insert(0);
        if *count >= limit {
            return false;
        }
        *count += 1;
        true
    }

    /// Drop records older than `max_age_ms` and counters without a record.
    pub fn prune(&mut self, now: u64, max_age_ms: u64) -> usize {
        let before = self.messages.len();
        self.messages.retain(|_, m| !m.is_expired(now, max_age_ms));
        let messages = &self.messages;
        self.num_resends.retain(|id, _| messages.contains_key(id));
        before - self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connecting_and_failed_change_the_set() {
        assert_eq!(
            StatusTransition::of(MessageDeliveryStatus::Connecting),
            StatusTransition::Insert
        );
        assert_eq!(
            StatusTransition::of(MessageDeliveryStatus::Failed),
            StatusTransition::Remove
        );
        for status in [
            MessageDeliveryStatus::Sent,
            MessageDeliveryStatus::AckReceived,
            MessageDeliveryStatus::TryAddToMailbox,
            MessageDeliveryStatus::AddedToMailbox,
            MessageDeliveryStatus::MailboxMsgReceived,
        ] {
            assert_eq!(StatusTransition::of(status), StatusTransition::Unchanged);
        }
    }

    #[test]
    fn test_resend_counter_stops_at_limit() {
        let mut store = ResendStore::default();
        assert!(store.try_count_resend("m", 2));
        assert!(store.try_count_resend("m", 2));
        assert!(!store.try_count_resend("m", 2));
        assert_eq!(store.num_resends("m"), 2);
    }
}
