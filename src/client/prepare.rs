//! Commit extraction, embedding and artifact creation

use super::GitSearchClient;
use crate::embedding::{EmbeddingProvider, EmbeddingSpec, embed_with_timeout, truncate_chars};
use crate::error::GitSearchError;
use crate::git::{CommitQuery, GitWalker};
use crate::store::lock::{LockMode, StoreLock};
use crate::store::{ArtifactWriter, Provenance};
use crate::types::{CommitRecord, PrepareRequest, PrepareResponse};
use anyhow::Context;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Commits read from a repository, with where they came from
struct Extraction {
    repo_name: String,
    repo_path: String,
    branch: String,
    records: Vec<CommitRecord>,
}

pub(crate) async fn do_prepare(
    client: &GitSearchClient,
    req: PrepareRequest,
    cancel: CancellationToken,
) -> Result<PrepareResponse, GitSearchError> {
    let start_time = Instant::now();
    req.validate()?;

    let config = &client.config;
    let spec = EmbeddingSpec::parse(
        req.provider.as_deref().unwrap_or(&config.embedding.provider),
        req.model.as_deref().unwrap_or(&config.embedding.model),
    )?;

    tracing::info!("Preparing embeddings for {} with {}", req.path, spec);

    let provider = client.embedding_factory.create(&spec)?;

    let query = CommitQuery {
        branch: req.branch.clone(),
        max_commits: req.max_commits,
        since: req.since,
        until: req.until,
    };
    let extraction = tokio::task::spawn_blocking({
        let path = req.path.clone();
        move || extract(&path, &query)
    })
    .await
    .context("Failed to spawn blocking task for commit extraction")??;

    let commits_extracted = extraction.records.len();

    let _lock = StoreLock::acquire(
        client.layout.lock_file(),
        LockMode::Shared,
        client.lock_timeout(),
    )
    .await?;

    let vectors = embed_records(
        provider.as_ref(),
        &extraction.records,
        config.embedding.batch_size,
        Duration::from_secs(config.embedding.timeout_secs),
        &cancel,
    )
    .await?;

    let provenance = Provenance {
        repo_name: extraction.repo_name,
        repo_path: extraction.repo_path,
        branch: extraction.branch,
        provider: spec.provider.to_string(),
        model: spec.model.clone(),
    };
    let writer = ArtifactWriter::new(client.layout.clone());
    let staged = writer
        .stage(provenance, &extraction.records, vectors)
        .await?;

    if cancel.is_cancelled() {
        tracing::warn!("Prepare cancelled before commit, discarding staged artifact");
        return Err(GitSearchError::Cancelled);
    }
    let artifact = staged.commit()?;

    let duration_ms = start_time.elapsed().as_millis() as u64;
    tracing::info!(
        "Prepared artifact {} with {} commits in {} ms",
        artifact.artifact_id,
        artifact.document_count,
        duration_ms
    );

    Ok(PrepareResponse {
        artifact,
        commits_extracted,
        duration_ms,
    })
}

fn extract(path: &str, query: &CommitQuery) -> Result<Extraction, GitSearchError> {
    let walker = GitWalker::open(path)?;
    let branch = match &query.branch {
        Some(name) => name.clone(),
        None => walker.current_branch()?,
    };
    let records = walker.commits(query)?;
    if records.is_empty() {
        return Err(crate::error::GitError::NoCommitsFound(format!(
            "{} (no commits match the requested filters)",
            path
        ))
        .into());
    }

    let repo_path = walker
        .repo_path()
        .canonicalize()
        .unwrap_or_else(|_| walker.repo_path().to_path_buf());

    Ok(Extraction {
        repo_name: walker.repo_name(),
        repo_path: repo_path.display().to_string(),
        branch,
        records,
    })
}

/// Embed every commit message, batch by batch, in record order
async fn embed_records(
    provider: &dyn EmbeddingProvider,
    records: &[CommitRecord],
    batch_size: usize,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<f32>>, GitSearchError> {
    let max_chars = provider.max_input_chars();
    let texts: Vec<String> = records
        .iter()
        .map(|r| truncate_chars(&r.message, max_chars).to_string())
        .collect();

    let total_batches = texts.len().div_ceil(batch_size.max(1));
    let mut vectors = Vec::with_capacity(texts.len());

    for (i, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!("Prepare cancelled after {} of {} batches", i, total_batches);
            return Err(GitSearchError::Cancelled);
        }

        tracing::debug!(
            "Embedding batch {}/{} ({} commits)",
            i + 1,
            total_batches,
            batch.len()
        );
        vectors.extend(embed_with_timeout(provider, batch, timeout).await?);
    }

    Ok(vectors)
}
