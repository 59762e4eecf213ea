//! # Shared Persistence
//!
//! Whole-snapshot persistence for the in-memory stores of every service.
//! Memory is authoritative; disk lags by at most one write interval.
//!
//! ## Components
//!
//! - [`PersistenceStore`]: async load/store port
//! - [`FilePersistence`]: bincode file with magic header, written via temp
//!   file + fsync + rename
//! - [`InMemoryPersistence`]: test double with failure injection
//! - [`RateLimitedPersister`]: coalesces persist requests, at most one write
//!   per interval
//! - [`DirectoryLock`]: exclusive `fs2` lock on the database directory
//! - [`StoreLayout`]: on-disk layout under `<data_dir>/db`

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod file;
pub mod layout;
pub mod lock;
pub mod memory;
pub mod ports;
pub mod rate_limited;

pub use errors::PersistenceError;
pub use file::FilePersistence;
pub use layout::StoreLayout;
pub use lock::DirectoryLock;
pub use memory::InMemoryPersistence;
pub use ports::PersistenceStore;
pub use rate_limited::{PersisterStats, RateLimitedPersister};
