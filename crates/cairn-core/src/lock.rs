//! Advisory file locking for ledger writers.
//!
//! Writers take an exclusive `flock`-style lock on a sidecar `ledger.lock`
//! next to the ledger, never on the ledger itself, so readers can scan the
//! file without ever blocking. Acquisition polls with a bounded wait and
//! surfaces [`LockError::Timeout`] rather than hanging.
//!
//! Advisory locks are only as good as the filesystem: network mounts may
//! silently ignore them.

use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Failure to take the writer lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("ledger lock at {} still held after {waited:?}", .path.display())]
    Timeout { path: PathBuf, waited: Duration },
    #[error("lock file unavailable: {0}")]
    Io(#[from] io::Error),
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::LedgerWriteFailed,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// RAII guard for the ledger-wide exclusive write lock.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Acquire an exclusive advisory lock on `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if another holder keeps the lock for
    /// longer than `timeout`, or [`LockError::Io`] if the lock file cannot
    /// be opened.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let started = Instant::now();
        let deadline = started + timeout;
        while file.try_lock_exclusive().is_err() {
            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: started.elapsed(),
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }
        tracing::trace!(path = %path.display(), waited = ?started.elapsed(), "ledger lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
