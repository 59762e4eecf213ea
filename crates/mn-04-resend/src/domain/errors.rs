//! Resend tracker errors.

use shared_persistence::PersistenceError;
use shared_types::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResendError {
    #[error("no pending message with id {0}")]
    UnknownMessage(String),

    #[error("message {message_id} was already resent {limit} times")]
    ResendLimitReached { message_id: String, limit: u32 },

    #[error("resend failed: {0}")]
    Transport(#[from] TransportError),

    #[error("persisting resend messages failed: {0}")]
    Persistence(#[from] PersistenceError),
}
