//! # File Persistence
//!
//! File format: `MAGIC (4) | VERSION (u16 LE) | bincode body`.
//! Writes go to `<file>.tmp`, are fsynced, then renamed over the target so
//! a crash leaves either the old or the new snapshot.

use crate::errors::PersistenceError;
use crate::ports::PersistenceStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MAGIC: &[u8; 4] = b"MNDB";
pub const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 6;

pub struct FilePersistence<T> {
    path: PathBuf,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FilePersistence<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistenceError::io(path, e)),
    };

    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(PersistenceError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    bincode::deserialize(&bytes[HEADER_LEN..])
        .map(Some)
        .map_err(|e| PersistenceError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn write_snapshot<T: Serialize>(path: &Path, snapshot: &T) -> Result<usize, PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    }

    let body = bincode::serialize(snapshot).map_err(|e| PersistenceError::Encode(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);

    let temp_path = path.with_extension("tmp");
    let mut file =
        std::fs::File::create(&temp_path).map_err(|e| PersistenceError::io(&temp_path, e))?;
    file.write_all(&bytes)
        .map_err(|e| PersistenceError::io(&temp_path, e))?;
    file.sync_all()
        .map_err(|e| PersistenceError::io(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| PersistenceError::io(path, e))?;

    Ok(bytes.len())
}

#[async_trait]
impl<T> PersistenceStore<T> for FilePersistence<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    async fn load(&self) -> Result<Option<T>, PersistenceError> {
        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || read_snapshot::<T>(&path))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))??;
        match &loaded {
            Some(_) => info!(store = %self.name, path = %self.path.display(), "Loaded persisted store"),
            None => debug!(store = %self.name, "No persisted store yet"),
        }
        Ok(loaded)
    }

    async fn store(&self, snapshot: T) -> Result<(), PersistenceError> {
        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || write_snapshot(&path, &snapshot))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))??;
        debug!(store = %self.name, bytes = written, "Persisted store");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
