//! # git-gpt-search - Semantic Search over Git Commit History
//!
//! Embeds every commit message of a repository into a versioned on-disk
//! artifact, then answers natural-language questions by ranking commits by
//! cosine similarity and optionally asking an LLM to summarize the matches.
//!
//! ## Overview
//!
//! Two pipelines share one store:
//!
//! - **prepare**: walk a repository with git2, embed each commit message with
//!   a local FastEmbed model or the OpenAI embeddings API, and commit a new
//!   LanceDB-backed artifact atomically
//! - **search**: embed a query with the provider the artifact was built with,
//!   rank the artifact's commits, and optionally summarize them with an LLM
//!
//! Artifacts are immutable once committed; listing and cleanup operate on the
//! store as a whole.
//!
//! ## Architecture
//!
//! ```text
//!        CLI (clap)            library users
//!             \                    /
//!              +-- GitSearchClient +
//!             /         |          \
//!      GitWalker   EmbeddingProvider   Summarizer
//!     (git2)      (fastembed/OpenAI)   (OpenAI chat)
//!                       |
//!               store: writer / registry / lifecycle
//!                       |
//!                 LanceDB artifact
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the prepare/search/list/cleanup entry points
//! - [`git`]: repository walking and commit extraction
//! - [`embedding`]: embedding providers and the provider factory
//! - [`summarizer`]: LLM summarization of search results
//! - [`store`]: artifact layout, atomic writes, registry and cleanup
//! - [`config`]: configuration file and environment overrides
//! - [`types`]: request and response types
//! - [`error`]: error types
//! - [`paths`]: platform-specific default locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use git_gpt_search::{GitSearchClient, PrepareRequest, SearchRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GitSearchClient::new()?;
//!     client
//!         .prepare(PrepareRequest::new("."), CancellationToken::new())
//!         .await?;
//!
//!     let mut request = SearchRequest::new("when did we fix the login bug?");
//!     request.summarize = true;
//!     let response = client.search(request).await?;
//!     for hit in &response.hits {
//!         println!("{:.3} {}", hit.score, hit.record.subject());
//!     }
//!     Ok(())
//! }
//! ```

/// Prepare, search, list and cleanup entry points
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding providers (FastEmbed and OpenAI)
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Git repository walking and commit extraction
pub mod git;

/// Platform-specific default paths
pub mod paths;

/// Versioned on-disk embedding artifacts
pub mod store;

/// LLM summarization of search results
pub mod summarizer;

/// Request and response types
pub mod types;

pub use client::GitSearchClient;
pub use config::Config;
pub use error::GitSearchError;
pub use store::ArtifactMetadata;
pub use types::{
    CleanupReport, CommitRecord, PrepareRequest, PrepareResponse, SearchHit, SearchRequest,
    SearchResponse, SummaryOutcome,
};
