//! Persistence adapters for the data stores.

pub mod file;
pub mod memory;

pub use file::FileStoreProvider;
pub use memory::InMemoryStoreProvider;
