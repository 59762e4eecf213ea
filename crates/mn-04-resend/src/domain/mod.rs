//! Domain layer: pending messages, the durable set and its transitions.

pub mod errors;
pub mod message;
pub mod store;

pub use errors::ResendError;
pub use message::ResendMessageData;
pub use store::{ResendStore, StatusTransition};
