//! # Database Directory Lock
//!
//! Two nodes sharing a data directory would overwrite each other's
//! snapshots. The lock is held for the lifetime of the node and released on
//! drop.

use crate::errors::PersistenceError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Take an exclusive, non-blocking lock on `dir`, creating it if needed.
    pub fn acquire(dir: &Path) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
        let path = dir.join(Self::LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| PersistenceError::io(&path, e))?;

        if file.try_lock_exclusive().is_err() {
            return Err(PersistenceError::AlreadyLocked {
                path: dir.to_path_buf(),
            });
        }

        file.set_len(0).map_err(|e| PersistenceError::io(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| PersistenceError::io(&path, e))?;
        debug!(path = %path.display(), "Acquired database lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
