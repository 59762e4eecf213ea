//! Data storage error types.

use shared_persistence::PersistenceError;
use thiserror::Error;

use super::data::DataFamily;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("persistence failure for store {store}: {source}")]
    Persistence {
        store: String,
        #[source]
        source: PersistenceError,
    },

    #[error("no {family:?} store named {store} in the catalog")]
    UnknownStore { family: DataFamily, store: String },
}

impl StorageError {
    pub(crate) fn persistence(store: impl Into<String>, source: PersistenceError) -> Self {
        StorageError::Persistence {
            store: store.into(),
            source,
        }
    }
}
