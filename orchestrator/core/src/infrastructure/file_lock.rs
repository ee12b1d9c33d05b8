// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cross-process advisory locks.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Serialize writers of host-wide resources (firewall table,
//!   node config file) across worker processes
//!
//! [`FileLock`] holds an `fs2` exclusive lock for its lifetime. [`HostLock`]
//! puts an in-process mutex in front of it so threads of one process queue on
//! the mutex rather than on the file.

use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the exclusive lock on `path` is held. The file is created
    /// if missing and never removed.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release lock {:?}: {}", self.path, e);
        }
    }
}

/// Named host-wide lock: in-process mutex plus file lock.
pub struct HostLock {
    path: PathBuf,
    local: Mutex<()>,
}

pub struct HostLockGuard<'a> {
    _file: FileLock,
    _local: MutexGuard<'a, ()>,
}

impl HostLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), local: Mutex::new(()) }
    }

    pub fn lock(&self) -> io::Result<HostLockGuard<'_>> {
        let local = self.local.lock();
        let file = FileLock::acquire(&self.path)?;
        Ok(HostLockGuard { _file: file, _local: local })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_lock_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(".iptables.lock");
        let lock = FileLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert_eq!(lock.path(), path.as_path());
    }

    #[test]
    fn test_host_lock_excludes_threads() {
        let dir = tempfile::tempdir().unwrap();
        let lock = Arc::new(HostLock::new(dir.path().join(".lock")));
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let inside = inside.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = lock.lock().unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
