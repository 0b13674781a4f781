//! Query embedding, ranking and optional summarization

use super::GitSearchClient;
use crate::embedding::{EmbeddingSpec, embed_with_timeout};
use crate::error::{EmbeddingError, GitSearchError, ValidationError};
use crate::store::lock::{LockMode, StoreLock};
use crate::store::{ArtifactMetadata, CommitIndex, IndexHit};
use crate::summarizer::SummarizerKind;
use crate::types::{CommitRecord, SearchHit, SearchRequest, SearchResponse, SummaryOutcome};
use std::cmp::Ordering;
use std::str::FromStr;
use std::time::{Duration, Instant};

pub(crate) async fn do_search(
    client: &GitSearchClient,
    req: SearchRequest,
) -> Result<SearchResponse, GitSearchError> {
    let start_time = Instant::now();
    req.validate()?;

    let config = &client.config;
    let limit = req.limit.unwrap_or(config.search.limit);
    if limit == 0 {
        return Err(ValidationError::InvalidLimit(limit).into());
    }
    let requested = EmbeddingSpec::parse(
        req.provider.as_deref().unwrap_or(&config.embedding.provider),
        req.model.as_deref().unwrap_or(&config.embedding.model),
    )?;

    tracing::info!(
        "Search: query='{}', repo={}, limit={}",
        req.query,
        req.repo.as_deref().unwrap_or("<latest>"),
        limit
    );

    let _lock = StoreLock::acquire(
        client.layout.lock_file(),
        LockMode::Shared,
        client.lock_timeout(),
    )
    .await?;

    let registry = client.registry();
    let artifact = match &req.repo {
        Some(repo) => registry.latest(repo).await?,
        None => registry.latest_any().await?,
    };
    check_provider(&artifact, &requested)?;

    tracing::debug!(
        "Searching artifact {} ({} commits)",
        artifact.artifact_id,
        artifact.document_count
    );

    let provider = client.embedding_factory.create(&requested)?;
    let query_vector = embed_with_timeout(
        provider.as_ref(),
        std::slice::from_ref(&req.query),
        Duration::from_secs(config.embedding.timeout_secs),
    )
    .await?
    .pop()
    .ok_or(EmbeddingError::CountMismatch {
        expected: 1,
        actual: 0,
    })?;

    if query_vector.len() != artifact.dimension {
        return Err(EmbeddingError::DimensionMismatch {
            expected: artifact.dimension,
            actual: query_vector.len(),
        }
        .into());
    }

    // Fetch every row so ties are broken here rather than by the index
    let index = CommitIndex::open(&artifact.index_path()).await?;
    let candidates = index
        .nearest(query_vector, artifact.document_count.max(limit))
        .await?;
    let hits = rank(candidates, limit);

    let summary = if req.summarize {
        summarize(client, &req, &hits).await
    } else {
        SummaryOutcome::NotRequested
    };

    let duration_ms = start_time.elapsed().as_millis() as u64;
    tracing::info!("Search returned {} hits in {} ms", hits.len(), duration_ms);

    Ok(SearchResponse {
        artifact,
        hits,
        summary,
        duration_ms,
    })
}

/// The artifact's vector space must be the one the query will be embedded in
fn check_provider(
    artifact: &ArtifactMetadata,
    requested: &EmbeddingSpec,
) -> Result<(), ValidationError> {
    if artifact.provider == requested.provider.as_str() && artifact.model == requested.model {
        return Ok(());
    }
    Err(ValidationError::ProviderMismatch {
        stored_provider: artifact.provider.clone(),
        stored_model: artifact.model.clone(),
        requested_provider: requested.provider.to_string(),
        requested_model: requested.model.clone(),
    })
}

/// Similarity descending, then earliest commit, then lexical id
pub(crate) fn rank(candidates: Vec<IndexHit>, limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .map(|hit| {
            let score = 1.0 - hit.distance;
            SearchHit {
                record: hit.record,
                score: if score.is_finite() { score } else { 0.0 },
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.timestamp.cmp(&b.record.timestamp))
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    hits.truncate(limit);
    hits
}

/// Ask the LLM for an answer; failures degrade to a warning
async fn summarize(
    client: &GitSearchClient,
    req: &SearchRequest,
    hits: &[SearchHit],
) -> SummaryOutcome {
    let config = &client.config.summarizer;
    let provider = req.llm_provider.as_deref().unwrap_or(&config.provider);
    let model = req.llm_model.as_deref().unwrap_or(&config.model);

    let documents: Vec<CommitRecord> = hits.iter().map(|h| h.record.clone()).collect();

    let result = match SummarizerKind::from_str(provider) {
        Ok(kind) => match client.summarizer_factory.create(kind, model) {
            Ok(summarizer) => summarizer.summarize(&req.query, &documents).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(text) => SummaryOutcome::Generated { text },
        Err(e) => {
            tracing::warn!("Summarization failed, returning ranked commits only: {}", e);
            SummaryOutcome::Failed {
                warning: e.to_string(),
            }
        }
    }
}
