//! On-disk layout under `<data_dir>/db`:
//!
//! ```text
//! db/
//! ├── LOCK
//! ├── network/<family>/<store_name>
//! ├── network/peers_<transport>
//! └── private/resend_messages
//! ```

use shared_types::TransportType;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StoreLayout {
    db_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            db_dir: data_dir.as_ref().join("db"),
        }
    }

    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// One file per data family and store name.
    pub fn network_store(&self, family: &str, store_name: &str) -> PathBuf {
        self.db_dir.join("network").join(family).join(store_name)
    }

    pub fn peers(&self, transport: TransportType) -> PathBuf {
        self.db_dir
            .join("network")
            .join(format!("peers_{}", transport.as_str()))
    }

    pub fn resend_messages(&self) -> PathBuf {
        self.db_dir.join("private").join("resend_messages")
    }
}
