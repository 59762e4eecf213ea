//! # Data Storage (mn-01)
//!
//! Content-addressed stores for the data every node shares with the network.
//!
//! ## Data Families
//!
//! | Family | Identity | Updates | Expiry |
//! |--------|----------|---------|--------|
//! | Append-only | hash of bytes | never | never |
//! | Authenticated | hash of data | owner-signed sequence numbers | TTL |
//! | Authorized (authenticated) | hash of data | as authenticated | TTL |
//!
//! Authorized data additionally passes the [`AuthorizationVerifier`], which
//! checks the signer against a static key set or a deferred source such as
//! the [`BondedRoleRegistry`].
//!
//! ## Invariants
//!
//! - A hash is stored at most once; re-adding is a no-op
//! - Only stores listed in the [`StoreCatalog`] exist, and a request's
//!   metadata must equal its store's catalog entry
//! - A store never grows past its catalog `max_map_size`
//! - Append-only data is never pruned
//! - Memory is authoritative; disk lags by at most one persist interval
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Data model, store catalog, requests, store map, results, events
//! - `authorization/` - Signature and key-set verification, bonded roles
//! - `ports/` - Inbound API, outbound persistence provider
//! - `service/` - Store services and the registry routing between them
//! - `adapters/` - File and in-memory persistence providers

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod authorization;
pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use adapters::{FileStoreProvider, InMemoryStoreProvider};
pub use authorization::{AuthorizationVerifier, BondedRoleRegistry, DeferredAuthorizer, DenyAll, Verdict};
pub use domain::*;
pub use ports::{DataStorageApi, StorePersistenceProvider};
pub use service::{
    AppendOnlyDataStorageService, AuthenticatedDataStorageService, DataStorageService,
    StorageConfig, StorageMetricsSnapshot, StorageReport, StorageService, StoreReport,
};
