//! Filesystem-based locking for cross-process coordination
//!
//! `prepare` and `search` hold a shared lock on the store for their whole run;
//! `cleanup` takes it exclusively so it never deletes an artifact that is being
//! written or read. Locks use flock() and are released by the OS if the
//! process dies.

use crate::error::StoreError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Guard holding the store lock; released on drop
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
    path: PathBuf,
    mode: LockMode,
}

impl StoreLock {
    /// Try to take the lock without waiting
    ///
    /// Returns `Ok(None)` when a conflicting holder exists.
    pub fn try_acquire(lock_path: &Path, mode: LockMode) -> Result<Option<Self>, StoreError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| super::io_write_error(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(|e| super::io_write_error(lock_path, e))?;

        let result = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        };

        match result {
            Ok(()) => {
                tracing::debug!("Acquired {:?} store lock: {}", mode, lock_path.display());
                Ok(Some(Self {
                    _file: file,
                    path: lock_path.to_path_buf(),
                    mode,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(StoreError::StoreBusy(format!(
                "failed to lock {}: {}",
                lock_path.display(),
                e
            ))),
        }
    }

    /// Poll for the lock until `timeout` expires
    pub fn acquire_blocking(
        lock_path: &Path,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let start = Instant::now();
        let mut announced = false;

        loop {
            if let Some(lock) = Self::try_acquire(lock_path, mode)? {
                if announced {
                    tracing::info!("Acquired store lock after {:?}", start.elapsed());
                }
                return Ok(lock);
            }

            if start.elapsed() >= timeout {
                tracing::warn!(
                    "Timeout waiting for store lock {} after {:?}",
                    lock_path.display(),
                    timeout
                );
                return Err(StoreError::StoreBusy(format!(
                    "another git-gpt-search process holds {} (waited {:?})",
                    lock_path.display(),
                    timeout
                )));
            }

            if !announced {
                tracing::info!(
                    "Waiting for {:?} store lock on {} (timeout: {:?})",
                    mode,
                    lock_path.display(),
                    timeout
                );
                announced = true;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Acquire the lock from async code without blocking the runtime
    pub async fn acquire(
        lock_path: PathBuf,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&lock_path, mode, timeout))
            .await
            .map_err(|e| StoreError::StoreBusy(format!("lock task failed: {}", e)))?
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        tracing::debug!("Releasing {:?} store lock: {}", self.mode, self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".store.lock");

        let a = StoreLock::try_acquire(&path, LockMode::Shared).unwrap();
        let b = StoreLock::try_acquire(&path, LockMode::Shared).unwrap();
        assert!(a.is_some());
        assert!(b.is_some());
    }

    #[test]
    fn test_exclusive_blocked_by_shared() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".store.lock");

        let shared = StoreLock::try_acquire(&path, LockMode::Shared).unwrap();
        assert!(shared.is_some());
        assert!(
            StoreLock::try_acquire(&path, LockMode::Exclusive)
                .unwrap()
                .is_none()
        );

        drop(shared);
        let exclusive = StoreLock::try_acquire(&path, LockMode::Exclusive).unwrap();
        assert_eq!(exclusive.unwrap().mode(), LockMode::Exclusive);
    }

    #[test]
    fn test_shared_blocked_by_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".store.lock");

        let _exclusive = StoreLock::try_acquire(&path, LockMode::Exclusive)
            .unwrap()
            .unwrap();
        assert!(
            StoreLock::try_acquire(&path, LockMode::Shared)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_blocking_acquire_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".store.lock");

        let _shared = StoreLock::try_acquire(&path, LockMode::Shared)
            .unwrap()
            .unwrap();
        let result =
            StoreLock::acquire_blocking(&path, LockMode::Exclusive, Duration::from_millis(150));
        assert!(matches!(result, Err(StoreError::StoreBusy(_))));
    }

    #[tokio::test]
    async fn test_async_acquire_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(".store.lock");

        let lock = StoreLock::acquire(path.clone(), LockMode::Shared, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(lock.mode(), LockMode::Shared);
        assert!(path.exists());
    }
}
