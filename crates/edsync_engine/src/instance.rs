//! Singleton instance arbitration.
//!
//! Each editor window activates its own engine instance, but only one of
//! them may run the timer-driven sync loop. Two mechanisms cover the two
//! scopes:
//!
//! - [`InstanceRegistry`] arbitrates instances within one process with
//!   FIFO promotion.
//! - [`ProcessLock`] arbitrates across processes with an advisory lock
//!   file.

use crate::error::{SyncError, SyncResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file name inside the state directory.
const LOCK_FILE: &str = "LOCK";

type PromoteFn = Box<dyn FnOnce() + Send>;

struct QueuedInstance {
    id: u64,
    on_promoted: Option<PromoteFn>,
}

#[derive(Default)]
struct RegistryInner {
    running: Option<u64>,
    queue: VecDeque<QueuedInstance>,
    promotions: u64,
}

/// FIFO registry of engine instances; the head of the queue runs.
///
/// The first registrant is promoted immediately. When the running
/// registrant unregisters, the next queued one is promoted. Promotion
/// callbacks fire at most once per registration, outside the registry
/// lock.
#[derive(Default)]
pub struct InstanceRegistry {
    inner: Mutex<RegistryInner>,
}

impl InstanceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance; `on_promoted` fires when it becomes the
    /// runner (possibly immediately).
    pub fn register(&self, id: u64, on_promoted: impl FnOnce() + Send + 'static) {
        {
            let mut inner = self.inner.lock();
            inner.queue.push_back(QueuedInstance {
                id,
                on_promoted: Some(Box::new(on_promoted)),
            });
        }
        self.refresh();
    }

    /// Unregisters an instance.
    ///
    /// If it was the runner, the next queued instance is promoted; if it
    /// was still queued, it is dropped from the queue.
    pub fn unregister(&self, id: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.running == Some(id) {
                inner.running = None;
            } else {
                inner.queue.retain(|entry| entry.id != id);
            }
        }
        self.refresh();
    }

    /// Returns the id of the running instance, if any.
    pub fn running(&self) -> Option<u64> {
        self.inner.lock().running
    }

    /// Returns how many promotions have happened.
    pub fn promotions(&self) -> u64 {
        self.inner.lock().promotions
    }

    fn refresh(&self) {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.running.is_some() {
                None
            } else if let Some(mut next) = inner.queue.pop_front() {
                inner.running = Some(next.id);
                inner.promotions += 1;
                next.on_promoted.take()
            } else {
                None
            }
        };

        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Cross-process advisory lock for the sync runner role.
///
/// Backed by a `LOCK` file and `fs2` exclusive locking; the lock is
/// released when the value is dropped (or the process dies).
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    _lock_file: File,
}

impl ProcessLock {
    /// Tries to acquire the runner lock under `dir`.
    ///
    /// Returns `Ok(None)` when another process already holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or lock file cannot be created.
    pub fn acquire(dir: &Path) -> SyncResult<Option<Self>> {
        std::fs::create_dir_all(dir)
            .map_err(|e| SyncError::Host(format!("cannot create {}: {}", dir.display(), e)))?;

        let path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| SyncError::Host(format!("cannot open {}: {}", path.display(), e)))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            _lock_file: lock_file,
        }))
    }

    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
