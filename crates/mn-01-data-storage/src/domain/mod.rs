//! Domain layer: data model, request envelopes, the store map and results.

pub mod catalog;
pub mod data;
pub mod errors;
pub mod events;
pub mod meta_data;
pub mod requests;
pub mod result;
pub mod store;

pub use catalog::{is_valid_store_name, CatalogEntry, StoreCatalog, MAX_STORE_NAME_LEN};
pub use data::*;
pub use errors::StorageError;
pub use events::{StorageEvent, StorageTopic};
pub use meta_data::*;
pub use requests::*;
pub use result::DataStorageResult;
pub use store::DataStore;
