//! Git repository operations for semantic search over commit history
//!
//! Walks a repository and extracts one `CommitRecord` per commit.

/// Git repository walking and commit extraction
pub mod walker;

pub use walker::{CommitQuery, DETACHED_HEAD, GitWalker};
