use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding {path} failed: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("{path} is not a store file (bad magic)")]
    BadMagic { path: PathBuf },

    #[error("{path} has unsupported format version {found} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u16,
        expected: u16,
    },

    #[error("Database directory {path} already in use")]
    AlreadyLocked { path: PathBuf },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Simulated write failure")]
    Injected,
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
