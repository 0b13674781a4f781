//! Deletion of artifacts and staging leftovers

use super::lock::{LockMode, StoreLock};
use super::StoreLayout;
use crate::error::StoreError;
use crate::types::CleanupReport;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

/// The only component allowed to delete committed artifacts
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    layout: StoreLayout,
    lock_timeout: Duration,
}

impl LifecycleManager {
    pub fn new(layout: StoreLayout, lock_timeout: Duration) -> Self {
        Self {
            layout,
            lock_timeout,
        }
    }

    /// Remove every artifact and staging directory
    ///
    /// Waits for running prepare/search operations to release the store.
    /// Files in the store root other than the two namespaces are left alone.
    pub async fn cleanup(&self) -> Result<CleanupReport, StoreError> {
        if !self.layout.root().exists() {
            tracing::info!(
                "Store {} does not exist, nothing to clean",
                self.layout.root().display()
            );
            return Ok(CleanupReport::default());
        }

        let _lock = StoreLock::acquire(
            self.layout.lock_file(),
            LockMode::Exclusive,
            self.lock_timeout,
        )
        .await?;

        let layout = self.layout.clone();
        let report = tokio::task::spawn_blocking(move || -> Result<CleanupReport, StoreError> {
            Ok(CleanupReport {
                artifacts_removed: clear_namespace(&layout.artifacts_dir())?,
                staging_removed: clear_namespace(&layout.staging_dir())?,
            })
        })
        .await
        .map_err(|e| StoreError::DeleteFailed {
            path: self.layout.root().display().to_string(),
            reason: format!("cleanup task failed: {}", e),
        })??;

        tracing::info!(
            "Cleanup removed {} artifacts and {} staging directories",
            report.artifacts_removed,
            report.staging_removed
        );
        Ok(report)
    }
}

/// Delete every entry of `dir`, then `dir` itself; returns the entry count
fn clear_namespace(dir: &Path) -> Result<usize, StoreError> {
    let delete_err = |path: &Path, e: std::io::Error| StoreError::DeleteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(delete_err(dir, e)),
    };

    let mut removed = 0;
    for entry in read_dir {
        let path = entry.map_err(|e| delete_err(dir, e))?.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                tracing::debug!("Deleted {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(delete_err(&path, e)),
        }
    }

    match fs::remove_dir(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(delete_err(dir, e)),
    }
    Ok(removed)
}
