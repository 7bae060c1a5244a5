//! Single-instance run guard
//!
//! An OS advisory exclusive lock on a well-known path keeps two
//! invocations of the same pipeline from corrupting the batch snapshot or
//! double-spending the rate-limit budget. Acquisition never blocks:
//! contention fails immediately so the process can abort with a distinct
//! exit status and leave retrying to the external scheduler. The file's
//! content is meaningless; only the lock on it matters.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fd_lock::{RwLock, RwLockWriteGuard};
use tracing::debug;

use super::{EngineError, Result};

/// Exclusive advisory file lock for one pipeline run.
///
/// The guard returned by [`RunLock::try_acquire`] releases the lock when
/// dropped, on every exit path — normal completion, error returns, and
/// unwinding panics alike.
pub struct RunLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl RunLock {
    /// Open (creating if needed) the lock file. Does not take the lock.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the exclusive lock without blocking.
    ///
    /// Fails fast with `AlreadyRunning` when another process holds it.
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        let path = self.path.clone();
        match self.lock.try_write() {
            Ok(guard) => {
                debug!(path = %path.display(), "acquired run lock");
                Ok(guard)
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                Err(EngineError::AlreadyRunning(path))
            }
            Err(err) => Err(EngineError::Io(err)),
        }
    }
}
