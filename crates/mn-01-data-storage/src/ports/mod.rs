//! # Ports Layer
//!
//! - `inbound.rs` - API the storage service exposes to the runtime and other services
//! - `outbound.rs` - Persistence the service depends on

pub mod inbound;
pub mod outbound;

pub use inbound::DataStorageApi;
pub use outbound::{AppendOnlyPersistence, AuthenticatedPersistence, StorePersistenceProvider};
