//! Delivery states of a point-to-point message.

use serde::{Deserialize, Serialize};

/// Externally observed progress of a confidential message.
///
/// ```text
/// CONNECTING ─┬─> SENT ──> ACK_RECEIVED
///             ├─> TRY_ADD_TO_MAILBOX ──> ADDED_TO_MAILBOX ──> MAILBOX_MSG_RECEIVED
///             └─> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageDeliveryStatus {
    Connecting,
    Sent,
    AckReceived,
    TryAddToMailbox,
    AddedToMailbox,
    MailboxMsgReceived,
    Failed,
}

impl MessageDeliveryStatus {
    /// The receiver confirmed the message, directly or via its mailbox.
    pub fn is_received(&self) -> bool {
        matches!(
            self,
            MessageDeliveryStatus::AckReceived | MessageDeliveryStatus::MailboxMsgReceived
        )
    }

    /// No further transition is expected.
    pub fn is_terminal(&self) -> bool {
        self.is_received() || *self == MessageDeliveryStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(MessageDeliveryStatus::Failed.is_terminal());
        assert!(MessageDeliveryStatus::AckReceived.is_terminal());
        assert!(MessageDeliveryStatus::MailboxMsgReceived.is_terminal());
        assert!(!MessageDeliveryStatus::Sent.is_terminal());
        assert!(!MessageDeliveryStatus::AddedToMailbox.is_terminal());
        assert!(!MessageDeliveryStatus::Connecting.is_terminal());
    }
}
