// ABOUTME: Scoped inter-process locking on a sidecar lock file using advisory flock.
// ABOUTME: Acquisition waits a bounded time; the guard releases the lock on every exit path.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::StoreError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shared,
    Exclusive,
}

/// A lock file that is never renamed or truncated, so every process locks
/// the same inode even while the data file is replaced underneath it.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

/// Held lock. Dropping it unlocks and closes the file.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait up to `timeout` for exclusive access.
    pub fn exclusive(&self, timeout: Duration) -> Result<LockGuard, StoreError> {
        self.acquire(Mode::Exclusive, timeout)
    }

    /// Wait up to `timeout` for shared access.
    pub fn shared(&self, timeout: Duration) -> Result<LockGuard, StoreError> {
        self.acquire(Mode::Shared, timeout)
    }

    fn acquire(&self, mode: Mode, timeout: Duration) -> Result<LockGuard, StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;

        let start = Instant::now();
        loop {
            let attempt = match mode {
                Mode::Exclusive => FileExt::try_lock_exclusive(&file),
                Mode::Shared => FileExt::try_lock_shared(&file),
            };
            match attempt {
                Ok(()) => {
                    tracing::trace!(path = %self.path.display(), ?mode, "lock acquired");
                    return Ok(LockGuard {
                        file,
                        path: self.path.clone(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    let waited = start.elapsed();
                    if waited >= timeout {
                        return Err(StoreError::LockTimeout {
                            path: self.path.clone(),
                            waited,
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(timeout - waited));
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
