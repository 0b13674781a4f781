//! Artifact writer: stage, build, then atomically publish
//!
//! Nothing becomes visible to the registry until the staging directory is
//! renamed into `artifacts/`. A `StagedArtifact` that is dropped without being
//! committed removes its staging directory.

use super::{
    ArtifactMetadata, CommitIndex, FORMAT_VERSION, Registry, StoreLayout, artifact_id,
    io_write_error,
};
use crate::error::StoreError;
use crate::types::CommitRecord;
use chrono::{DateTime, SubsecRound, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Attempts at finding an unused artifact id before giving up
const MAX_ID_ATTEMPTS: usize = 64;

/// Where an artifact's commits came from and how they were embedded
#[derive(Debug, Clone)]
pub struct Provenance {
    pub repo_name: String,
    pub repo_path: String,
    pub branch: String,
    pub provider: String,
    pub model: String,
}

/// Staging directory removed on drop unless released
struct StagingDir {
    path: PathBuf,
    keep: bool,
}

impl StagingDir {
    fn create(path: PathBuf) -> Result<Option<Self>, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_write_error(parent, e))?;
        }
        match fs::create_dir(&path) {
            Ok(()) => Ok(Some(Self { path, keep: false })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(io_write_error(&path, e)),
        }
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!("Removed staging directory {}", self.path.display()),
            Err(e) => tracing::warn!(
                "Failed to remove staging directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// A fully built artifact waiting in `staging/`
pub struct StagedArtifact {
    layout: StoreLayout,
    staging: StagingDir,
    metadata: ArtifactMetadata,
}

impl StagedArtifact {
    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    /// Publish the artifact by renaming it into `artifacts/`
    ///
    /// If another writer already published the same id, the timestamp is bumped
    /// and the rename retried under the new id.
    pub fn commit(mut self) -> Result<ArtifactMetadata, StoreError> {
        let artifacts_dir = self.layout.artifacts_dir();
        fs::create_dir_all(&artifacts_dir).map_err(|e| io_write_error(&artifacts_dir, e))?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let target = self.layout.artifact_dir(&self.metadata.artifact_id);
            if !target.exists() {
                match fs::rename(&self.staging.path, &target) {
                    Ok(()) => {
                        self.staging.keep = true;
                        tracing::info!(
                            "Committed artifact {} ({} commits)",
                            self.metadata.artifact_id,
                            self.metadata.document_count
                        );
                        return Ok(self.metadata.clone());
                    }
                    Err(e) if !target.exists() => return Err(io_write_error(&target, e)),
                    Err(_) => {}
                }
            }

            tracing::debug!(
                "Artifact {} already exists, bumping timestamp",
                self.metadata.artifact_id
            );
            let created_at = self.metadata.created_at + chrono::Duration::microseconds(1);
            self.assign_identity(created_at)?;
        }

        Err(io_write_error(
            &self.staging.path,
            "could not allocate a unique artifact id",
        ))
    }

    fn assign_identity(&mut self, created_at: DateTime<Utc>) -> Result<(), StoreError> {
        let id = artifact_id(&self.metadata.repo_name, created_at);
        self.metadata.created_at = created_at;
        self.metadata.storage_path = self.layout.artifact_dir(&id).display().to_string();
        self.metadata.artifact_id = id;
        write_metadata(&self.staging.path, &self.metadata)
    }
}

/// Writes new artifacts into a store
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    layout: StoreLayout,
}

impl ArtifactWriter {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Build an artifact in `staging/` without publishing it
    pub async fn stage(
        &self,
        provenance: Provenance,
        records: &[CommitRecord],
        vectors: Vec<Vec<f32>>,
    ) -> Result<StagedArtifact, StoreError> {
        validate_input(records, &vectors)?;
        let dimension = vectors[0].len();

        let (staging, created_at) = self.allocate(&provenance.repo_name).await?;
        let id = artifact_id(&provenance.repo_name, created_at);

        tracing::debug!(
            "Staging artifact {} at {}",
            id,
            staging.path.display()
        );

        CommitIndex::create(&StoreLayout::index_dir(&staging.path), records, vectors).await?;

        let metadata = ArtifactMetadata {
            storage_path: self.layout.artifact_dir(&id).display().to_string(),
            artifact_id: id,
            repo_name: provenance.repo_name,
            repo_path: provenance.repo_path,
            branch: provenance.branch,
            provider: provenance.provider,
            model: provenance.model,
            dimension,
            created_at,
            document_count: records.len(),
            format_version: FORMAT_VERSION,
        };
        write_metadata(&staging.path, &metadata)?;

        Ok(StagedArtifact {
            layout: self.layout.clone(),
            staging,
            metadata,
        })
    }

    /// Stage and immediately commit
    pub async fn write(
        &self,
        provenance: Provenance,
        records: &[CommitRecord],
        vectors: Vec<Vec<f32>>,
    ) -> Result<ArtifactMetadata, StoreError> {
        self.stage(provenance, records, vectors).await?.commit()
    }

    /// Pick a creation time later than any existing artifact of the repo and
    /// claim its staging directory
    async fn allocate(&self, repo_name: &str) -> Result<(StagingDir, DateTime<Utc>), StoreError> {
        let now = Utc::now().trunc_subsecs(6);
        let latest = Registry::new(self.layout.clone())
            .list()
            .await?
            .into_iter()
            .filter(|m| m.repo_name == repo_name)
            .map(|m| m.created_at)
            .max();

        let mut created_at = match latest {
            Some(prev) if prev >= now => prev + chrono::Duration::microseconds(1),
            _ => now,
        };

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = artifact_id(repo_name, created_at);
            if !self.layout.artifact_dir(&id).exists()
                && let Some(staging) =
                    StagingDir::create(self.layout.staging_artifact_dir(&id))?
            {
                return Ok((staging, created_at));
            }
            created_at += chrono::Duration::microseconds(1);
        }

        Err(io_write_error(
            &self.layout.staging_dir(),
            "could not allocate a unique artifact id",
        ))
    }
}

fn validate_input(records: &[CommitRecord], vectors: &[Vec<f32>]) -> Result<(), StoreError> {
    if records.is_empty() {
        return Err(StoreError::InvalidArtifact(
            "an artifact needs at least one commit".to_string(),
        ));
    }
    if records.len() != vectors.len() {
        return Err(StoreError::InvalidArtifact(format!(
            "{} records but {} vectors",
            records.len(),
            vectors.len()
        )));
    }
    let dimension = vectors[0].len();
    if dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
        return Err(StoreError::InvalidArtifact(
            "vectors must share one non-zero dimension".to_string(),
        ));
    }
    Ok(())
}

fn write_metadata(dir: &Path, metadata: &ArtifactMetadata) -> Result<(), StoreError> {
    let path = StoreLayout::metadata_file(dir);
    let json = serde_json::to_string_pretty(metadata).map_err(|e| io_write_error(&path, e))?;
    fs::write(&path, json).map_err(|e| io_write_error(&path, e))
}
