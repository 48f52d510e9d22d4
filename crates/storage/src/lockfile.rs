// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative sentinel lock.
//!
//! Exclusive-create of a `.lock` file next to the guarded path. A sentinel
//! older than [`LockFile::STALE_TTL`] is presumed abandoned and stolen.
//! Holders must keep critical sections short (~10 ms per operation).

use crate::StoreError;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// RAII guard over a sentinel lock file. Released on drop.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Age after which an existing sentinel is presumed abandoned.
    pub const STALE_TTL: Duration = Duration::from_secs(10);

    /// Total time to keep retrying before giving up.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

    const RETRY_SLEEP: Duration = Duration::from_millis(10);

    /// Acquire the lock guarding `target` (creates `<target>.lock`).
    pub fn acquire(target: &Path) -> Result<Self, StoreError> {
        let path = Self::lock_path(target);
        let start = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path) {
                        tracing::warn!(path = %path.display(), "stealing stale lock sentinel");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if start.elapsed() >= Self::ACQUIRE_TIMEOUT {
                        return Err(StoreError::LockTimeout {
                            path,
                            waited_ms: start.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(Self::RETRY_SLEEP);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Path of the sentinel guarding `target`.
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut name = target.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        target.with_file_name(name)
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .is_some_and(|age| age > Self::STALE_TTL)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "lockfile_tests.rs"]
mod tests;
