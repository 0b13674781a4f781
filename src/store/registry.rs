//! Registry of committed artifacts, derived from a scan of `artifacts/`

use super::{ArtifactMetadata, StoreLayout, io_read_error};
use crate::error::StoreError;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Result of scanning the artifacts directory
#[derive(Debug, Default)]
pub struct RegistryScan {
    /// Readable artifacts, newest first
    pub entries: Vec<ArtifactMetadata>,
    /// Artifact directories whose metadata is missing or corrupted
    pub problems: Vec<StoreError>,
}

/// Lists artifacts and resolves the latest one for a repository
///
/// Holds no state of its own; every call rescans the store.
#[derive(Debug, Clone)]
pub struct Registry {
    layout: StoreLayout,
}

impl Registry {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Scan `artifacts/`, keeping unreadable entries as problems
    pub async fn scan(&self) -> Result<RegistryScan, StoreError> {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || scan_blocking(&layout))
            .await
            .map_err(|e| StoreError::ReadFailed {
                path: self.layout.artifacts_dir().display().to_string(),
                reason: format!("scan task failed: {}", e),
            })?
    }

    /// All readable artifacts, newest first
    pub async fn list(&self) -> Result<Vec<ArtifactMetadata>, StoreError> {
        let scan = self.scan().await?;
        for problem in &scan.problems {
            tracing::warn!("Skipping artifact: {}", problem);
        }
        Ok(scan.entries)
    }

    /// Newest artifact for `repo_name`
    pub async fn latest(&self, repo_name: &str) -> Result<ArtifactMetadata, StoreError> {
        self.list()
            .await?
            .into_iter()
            .find(|m| m.repo_name == repo_name)
            .ok_or_else(|| StoreError::NoEmbeddingsFound {
                repo: Some(repo_name.to_string()),
            })
    }

    /// Newest artifact of any repository
    pub async fn latest_any(&self) -> Result<ArtifactMetadata, StoreError> {
        self.list()
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NoEmbeddingsFound { repo: None })
    }
}

fn scan_blocking(layout: &StoreLayout) -> Result<RegistryScan, StoreError> {
    let artifacts_dir = layout.artifacts_dir();
    let read_dir = match fs::read_dir(&artifacts_dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RegistryScan::default()),
        Err(e) => return Err(io_read_error(&artifacts_dir, e)),
    };

    let mut scan = RegistryScan::default();
    for entry in read_dir {
        let entry = entry.map_err(|e| io_read_error(&artifacts_dir, e))?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        match read_metadata(&dir) {
            Ok(metadata) => scan.entries.push(metadata),
            Err(problem) => scan.problems.push(problem),
        }
    }

    scan.entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.artifact_id.cmp(&a.artifact_id))
    });
    Ok(scan)
}

fn read_metadata(dir: &Path) -> Result<ArtifactMetadata, StoreError> {
    let path = StoreLayout::metadata_file(dir);
    let content = fs::read_to_string(&path).map_err(|e| io_read_error(&path, e))?;
    let corrupt = |reason: String| StoreError::CorruptMetadata {
        path: path.display().to_string(),
        reason,
    };

    let metadata: ArtifactMetadata =
        serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

    let dir_name = dir.file_name().map(|n| n.to_string_lossy().into_owned());
    if dir_name.as_deref() != Some(metadata.artifact_id.as_str()) {
        return Err(corrupt(format!(
            "names artifact '{}' but lives in '{}'",
            metadata.artifact_id,
            dir.display()
        )));
    }
    Ok(metadata)
}
