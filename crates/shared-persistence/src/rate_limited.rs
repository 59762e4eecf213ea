//! # Rate-Limited Persister
//!
//! Services call [`RateLimitedPersister::request_persist`] after every
//! mutation. Requests arriving while a write is scheduled are coalesced into
//! that write; consecutive writes are at least `min_interval` apart. The
//! snapshot is taken at write time from the owner's snapshot function, so a
//! write always reflects the latest in-memory state.
//!
//! A failed write leaves the persister dirty. It is retried by the next
//! request or by [`RateLimitedPersister::flush`], never in a tight loop.

use crate::errors::PersistenceError;
use crate::ports::PersistenceStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lower bound for the interval between two writes.
pub const MIN_WRITE_INTERVAL: Duration = Duration::from_secs(1);

type SnapshotFn<T> = dyn Fn() -> T + Send + Sync;

#[derive(Debug, Default)]
struct WriterState {
    dirty: bool,
    scheduled: bool,
    last_write: Option<Instant>,
}

struct Inner<T: Send + 'static> {
    store: Arc<dyn PersistenceStore<T>>,
    snapshot: Box<SnapshotFn<T>>,
    min_interval: Duration,
    state: Mutex<WriterState>,
    // Serializes writes between the scheduled task and flush().
    write_guard: tokio::sync::Mutex<()>,
    writes: AtomicU64,
    failures: AtomicU64,
    requests: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersisterStats {
    pub requests: u64,
    pub writes: u64,
    pub failures: u64,
}

pub struct RateLimitedPersister<T: Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> Clone for RateLimitedPersister<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> RateLimitedPersister<T> {
    /// `min_interval` is raised to [`MIN_WRITE_INTERVAL`] when smaller,
    /// except in tests which may use shorter intervals.
    pub fn new<F>(store: Arc<dyn PersistenceStore<T>>, min_interval: Duration, snapshot: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let min_interval = if cfg!(test) {
            min_interval
        } else {
            min_interval.max(MIN_WRITE_INTERVAL)
        };
        Self::with_interval(store, min_interval, snapshot)
    }

    /// Constructor without the interval floor, for tests in other crates.
    pub fn with_interval<F>(
        store: Arc<dyn PersistenceStore<T>>,
        min_interval: Duration,
        snapshot: F,
    ) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                store,
                snapshot: Box::new(snapshot),
                min_interval,
                state: Mutex::new(WriterState::default()),
                write_guard: tokio::sync::Mutex::new(()),
                writes: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                requests: AtomicU64::new(0),
            }),
        }
    }

    /// Mark the state dirty and schedule a write if none is pending.
    ///
    /// Outside a tokio runtime the request is only recorded; the next
    /// request inside a runtime or `flush()` writes it.
    pub fn request_persist(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.inner.state.lock();
        state.dirty = true;
        if state.scheduled {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        state.scheduled = true;
        let delay = state
            .last_write
            .map(|t| self.inner.min_interval.saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);
        drop(state);

        let inner = self.inner.clone();
        handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            inner.scheduled_write().await;
        });
    }

    /// Write immediately if anything is pending.
    /// Waits for an in-flight write before checking for pending changes.
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let _guard = self.inner.write_guard.lock().await;
        if !self.inner.state.lock().dirty {
            return Ok(());
        }
        self.inner.write_locked().await
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn store_name(&self) -> &str {
        self.inner.store.name()
    }

    pub fn stats(&self) -> PersisterStats {
        PersisterStats {
            requests: self.inner.requests.load(Ordering::Relaxed),
            writes: self.inner.writes.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
        }
    }
}

impl<T: Send + 'static> Inner<T> {
    async fn scheduled_write(&self) {
        let result = {
            let _guard = self.write_guard.lock().await;
            if self.state.lock().dirty {
                self.write_locked().await
            } else {
                Ok(())
            }
        };
        self.state.lock().scheduled = false;
        if let Err(e) = result {
            warn!(store = %self.store.name(), error = %e, "Persisting store failed, retrying on next write");
        }
    }

    /// Caller holds `write_guard`.
    async fn write_locked(&self) -> Result<(), PersistenceError> {
        // Mutations after this point mark the state dirty again.
        self.state.lock().dirty = false;
        let snapshot = (self.snapshot)();

        match self.store.store(snapshot).await {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                self.state.lock().last_write = Some(Instant::now());
                debug!(store = %self.store.name(), "Snapshot written");
                Ok(())
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let mut state = self.state.lock();
                state.dirty = true;
                state.last_write = Some(Instant::now());
                Err(e)
            }
        }
    }
}
