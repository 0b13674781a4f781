//! Core library client for git-gpt-search
//!
//! This module provides the main client interface for preparing and searching
//! commit embeddings, usable directly as a library or through the CLI.

mod prepare;
mod search;

use crate::config::Config;
use crate::embedding::{DefaultProviderFactory, EmbeddingProviderFactory};
use crate::error::GitSearchError;
use crate::store::{ArtifactMetadata, LifecycleManager, Registry, RegistryScan, StoreLayout};
use crate::summarizer::{DefaultSummarizerFactory, SummarizerFactory};
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Main client for the commit search pipeline
///
/// Owns the configuration and the provider factories; the store itself is
/// rescanned on every call, so clients are cheap and hold no artifact state.
///
/// # Example
///
/// ```no_run
/// use git_gpt_search::{GitSearchClient, PrepareRequest, SearchRequest};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = GitSearchClient::new()?;
///
///     let prepared = client
///         .prepare(PrepareRequest::new("/path/to/repo"), CancellationToken::new())
///         .await?;
///     println!("Embedded {} commits", prepared.artifact.document_count);
///
///     let response = client.search(SearchRequest::new("login bug")).await?;
///     for hit in response.hits {
///         println!("{} {}", hit.record.id, hit.record.subject());
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct GitSearchClient {
    pub(crate) config: Arc<Config>,
    pub(crate) layout: StoreLayout,
    pub(crate) embedding_factory: Arc<dyn EmbeddingProviderFactory>,
    pub(crate) summarizer_factory: Arc<dyn SummarizerFactory>,
}

impl GitSearchClient {
    /// Create a client from the config file, environment and defaults
    pub fn new() -> Result<Self, GitSearchError> {
        let config = Config::new()?;
        Self::with_config(config)
    }

    /// Create a client with a custom configuration and the shipped providers
    pub fn with_config(config: Config) -> Result<Self, GitSearchError> {
        let embedding_factory = Arc::new(DefaultProviderFactory::new(config.embedding.clone()));
        let summarizer_factory =
            Arc::new(DefaultSummarizerFactory::new(config.summarizer.clone()));
        Self::with_factories(config, embedding_factory, summarizer_factory)
    }

    /// Create a client with custom provider factories
    pub fn with_factories(
        config: Config,
        embedding_factory: Arc<dyn EmbeddingProviderFactory>,
        summarizer_factory: Arc<dyn SummarizerFactory>,
    ) -> Result<Self, GitSearchError> {
        config.validate()?;

        tracing::info!(
            "Initializing git-gpt-search client (store: {})",
            config.storage.root_dir.display()
        );
        tracing::debug!(
            "Default embedding provider: {}/{}",
            config.embedding.provider,
            config.embedding.model
        );

        Ok(Self {
            layout: StoreLayout::new(config.storage.root_dir.clone()),
            config: Arc::new(config),
            embedding_factory,
            summarizer_factory,
        })
    }

    /// Extract a repository's commits, embed them and commit a new artifact
    ///
    /// Cancelling `cancel` stops the run before the next embedding batch (or
    /// before publishing) and leaves no artifact behind.
    pub async fn prepare(
        &self,
        request: PrepareRequest,
        cancel: CancellationToken,
    ) -> Result<PrepareResponse, GitSearchError> {
        prepare::do_prepare(self, request, cancel).await
    }

    /// Search the latest artifact of a repository
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, GitSearchError> {
        search::do_search(self, request).await
    }

    /// All committed artifacts, newest first
    pub async fn list_embeddings(&self) -> Result<Vec<ArtifactMetadata>, GitSearchError> {
        Ok(self.registry().list().await?)
    }

    /// Artifacts plus the directories whose metadata could not be read
    pub async fn scan_embeddings(&self) -> Result<RegistryScan, GitSearchError> {
        Ok(self.registry().scan().await?)
    }

    /// Delete every artifact and staging directory
    pub async fn cleanup(&self) -> Result<CleanupReport, GitSearchError> {
        let manager = LifecycleManager::new(self.layout.clone(), self.lock_timeout());
        Ok(manager.cleanup().await?)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn registry(&self) -> Registry {
        Registry::new(self.layout.clone())
    }

    pub(crate) fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.config.storage.lock_timeout_secs)
    }
}
