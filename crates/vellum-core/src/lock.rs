//! Repository locking.
//!
//! Uses advisory file locks (`flock(2)` on Unix) via the `fs2` crate.
//! The OS releases the lock automatically when a process exits, so no
//! PID tracking or stale lock detection is needed. The usage model is
//! still single-process, single-invocation-at-a-time; the lock only
//! guards against accidental concurrent invocations.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{VellumError, VellumResult};

/// Name of the lock file inside the repository data directory.
const LOCK_FILE: &str = "vellum.lock";

/// An exclusive repository lock, held for the lifetime of the value.
///
/// Dropping the value releases both the `flock` and the file handle.
pub struct RepoLock {
    _file: File,
}

impl RepoLock {
    /// Acquire an exclusive lock on the repository data directory.
    ///
    /// Polls with a short sleep interval until the lock is acquired or
    /// the timeout expires. Returns `VellumError::LockTimeout` on failure.
    pub fn acquire(data_dir: &Path, timeout: Duration) -> VellumResult<Self> {
        let lock_path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(RepoLock { _file: file }),
                Err(_) if start.elapsed() >= timeout => {
                    return Err(VellumError::LockTimeout);
                }
                Err(_) => std::thread::sleep(poll_interval),
            }
        }
    }
}
