//! On-disk embedding store
//!
//! Layout under the store root:
//!
//! ```text
//! .store.lock                               advisory lock file
//! staging/{artifact_id}/                    artifacts being written
//! artifacts/{artifact_id}/metadata.json     committed artifact metadata
//! artifacts/{artifact_id}/index/            LanceDB database with the `commits` table
//! ```
//!
//! Only `artifacts/` is ever listed, so an artifact becomes visible exactly when
//! its staging directory is renamed into place.

pub mod lifecycle;
pub mod lock;
pub mod registry;
pub mod vector_index;
pub mod writer;

pub use lifecycle::LifecycleManager;
pub use lock::StoreLock;
pub use registry::{Registry, RegistryScan};
pub use vector_index::{CommitIndex, IndexHit};
pub use writer::{ArtifactWriter, Provenance};

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Version of the artifact layout written by this crate
pub const FORMAT_VERSION: u32 = 1;

const LOCK_FILE: &str = ".store.lock";
const STAGING_DIR: &str = "staging";
const ARTIFACTS_DIR: &str = "artifacts";
const METADATA_FILE: &str = "metadata.json";
const INDEX_DIR: &str = "index";

/// Metadata of one committed embedding artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub artifact_id: String,
    /// Repository directory name
    pub repo_name: String,
    /// Absolute path the repository was read from
    pub repo_path: String,
    pub branch: String,
    /// Provider tag ("hf" or "openai")
    pub provider: String,
    pub model: String,
    /// Length of every stored vector
    pub dimension: usize,
    /// Commit time of the artifact (microsecond precision)
    pub created_at: DateTime<Utc>,
    /// Number of commit records (and vectors) in the index
    pub document_count: usize,
    /// Directory holding this artifact
    pub storage_path: String,
    pub format_version: u32,
}

impl ArtifactMetadata {
    /// Directory of the artifact's LanceDB database
    pub fn index_path(&self) -> PathBuf {
        Path::new(&self.storage_path).join(INDEX_DIR)
    }
}

/// Paths of the store's fixed layout
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(ARTIFACTS_DIR)
    }

    pub fn artifact_dir(&self, artifact_id: &str) -> PathBuf {
        self.artifacts_dir().join(artifact_id)
    }

    pub fn staging_artifact_dir(&self, artifact_id: &str) -> PathBuf {
        self.staging_dir().join(artifact_id)
    }

    pub fn metadata_file(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILE)
    }

    pub fn index_dir(dir: &Path) -> PathBuf {
        dir.join(INDEX_DIR)
    }
}

/// Repository name made safe for use in a directory name
pub fn repo_slug(repo_name: &str) -> String {
    let slug: String = repo_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if slug.is_empty() {
        "repo".to_string()
    } else {
        slug
    }
}

/// `{repo_slug}-{created_at}` with a sortable microsecond timestamp
pub fn artifact_id(repo_name: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        repo_slug(repo_name),
        created_at.format("%Y%m%dT%H%M%S%6fZ")
    )
}

pub(crate) fn io_read_error(path: &Path, err: impl std::fmt::Display) -> StoreError {
    StoreError::ReadFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

pub(crate) fn io_write_error(path: &Path, err: impl std::fmt::Display) -> StoreError {
    StoreError::WriteFailure {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
