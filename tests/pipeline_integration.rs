/// End-to-end prepare/search/list/cleanup runs against throwaway repositories
mod common;

use anyhow::Result;
use common::{BASE_TIME, client, client_with_config, init_repo};
use git_gpt_search::config::Config;
use git_gpt_search::error::{EmbeddingError, StoreError, SummarizerError, ValidationError};
use git_gpt_search::{GitSearchError, PrepareRequest, SearchRequest, SummaryOutcome};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const HISTORY: [&str; 6] = [
    "init",
    "add login",
    "fix login bug",
    "update docs",
    "refactor parser",
    "add database schema",
];

async fn prepare(
    client: &git_gpt_search::GitSearchClient,
    repo: &std::path::Path,
) -> Result<git_gpt_search::PrepareResponse> {
    Ok(client
        .prepare(
            PrepareRequest::new(repo.to_string_lossy()),
            CancellationToken::new(),
        )
        .await?)
}

#[tokio::test]
async fn test_prepare_embeds_every_commit() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, factory) = client(&dir.path().join("store"))?;

    let response = prepare(&client, &repo).await?;
    assert_eq!(response.commits_extracted, HISTORY.len());
    assert_eq!(response.artifact.document_count, HISTORY.len());
    assert_eq!(response.artifact.dimension, common::DIMENSION);
    assert_eq!(response.artifact.repo_name, "demo");
    assert!(factory.calls() >= 1);

    let listed = client.list_embeddings().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].artifact_id, response.artifact.artifact_id);
    Ok(())
}

#[tokio::test]
async fn test_prepare_respects_max_commits() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, _) = client(&dir.path().join("store"))?;

    let mut request = PrepareRequest::new(repo.to_string_lossy());
    request.max_commits = Some(2);
    let response = client.prepare(request, CancellationToken::new()).await?;
    assert_eq!(response.artifact.document_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_commit_message_is_embedded() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &["", "add login"])?;
    let (client, _) = client(&dir.path().join("store"))?;

    let response = prepare(&client, &repo).await?;
    assert_eq!(response.artifact.document_count, 2);

    let mut request = SearchRequest::new("login");
    request.limit = Some(2);
    let response = client.search(request).await?;
    let messages: Vec<&str> = response
        .hits
        .iter()
        .map(|h| h.record.message.as_str())
        .collect();
    assert_eq!(messages, vec!["add login", ""]);
    assert!(response.hits[1].score.is_finite());
    Ok(())
}

#[tokio::test]
async fn test_reprepare_keeps_previous_artifact() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, _) = client(&dir.path().join("store"))?;

    let first = prepare(&client, &repo).await?;
    let second = prepare(&client, &repo).await?;
    assert_ne!(first.artifact.artifact_id, second.artifact.artifact_id);

    let listed = client.list_embeddings().await?;
    let ids: Vec<&str> = listed.iter().map(|a| a.artifact_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            second.artifact.artifact_id.as_str(),
            first.artifact.artifact_id.as_str()
        ]
    );
    assert!(listed[0].created_at > listed[1].created_at);

    let response = client.search(SearchRequest::new("login")).await?;
    assert_eq!(response.artifact.artifact_id, second.artifact.artifact_id);
    Ok(())
}

#[tokio::test]
async fn test_search_ranks_most_similar_commit_first() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &["init", "add login", "fix login bug"])?;
    let (client, _) = client(&dir.path().join("store"))?;
    prepare(&client, &repo).await?;

    let response = client.search(SearchRequest::new("login bug")).await?;
    let messages: Vec<&str> = response
        .hits
        .iter()
        .map(|h| h.record.message.as_str())
        .collect();
    assert_eq!(messages, vec!["fix login bug", "add login", "init"]);
    assert!((response.hits[0].score - 0.866).abs() < 0.01);
    Ok(())
}

#[tokio::test]
async fn test_search_without_prepare() -> Result<()> {
    let dir = TempDir::new()?;
    let (client, factory) = client(&dir.path().join("store"))?;

    let result = client.search(SearchRequest::new("login bug")).await;
    assert!(matches!(
        result,
        Err(GitSearchError::Store(StoreError::NoEmbeddingsFound { .. }))
    ));
    assert_eq!(factory.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_search_provider_mismatch() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, _) = client(&dir.path().join("store"))?;
    prepare(&client, &repo).await?;

    let mut request = SearchRequest::new("login");
    request.provider = Some("openai".to_string());
    request.model = Some("text-embedding-3-small".to_string());
    let result = client.search(request).await;
    assert!(matches!(
        result,
        Err(GitSearchError::Validation(
            ValidationError::ProviderMismatch { .. }
        ))
    ));
    Ok(())
}

#[tokio::test]
async fn test_query_too_long_never_embeds() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, factory) = client(&dir.path().join("store"))?;
    prepare(&client, &repo).await?;
    let before = factory.calls();

    let result = client.search(SearchRequest::new("a".repeat(201))).await;
    assert!(matches!(
        result,
        Err(GitSearchError::Validation(
            ValidationError::QueryTooLong { len: 201, max: 200 }
        ))
    ));
    assert_eq!(factory.calls(), before);

    // Exactly 200 characters is allowed
    let response = client.search(SearchRequest::new("a".repeat(200))).await?;
    assert!(!response.hits.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_limit_is_a_maximum() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, _) = client(&dir.path().join("store"))?;
    prepare(&client, &repo).await?;

    let mut request = SearchRequest::new("login");
    request.limit = Some(2);
    let response = client.search(request).await?;
    assert_eq!(response.hits.len(), 2);
    assert!(response.hits[0].score >= response.hits[1].score);

    let mut request = SearchRequest::new("login");
    request.limit = Some(50);
    let response = client.search(request).await?;
    assert_eq!(response.hits.len(), HISTORY.len());
    assert!(
        response
            .hits
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );
    Ok(())
}

#[tokio::test]
async fn test_equal_scores_prefer_earliest_commit() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(
        dir.path(),
        "demo",
        &["update readme", "add login", "update readme"],
    )?;
    let (client, _) = client(&dir.path().join("store"))?;
    prepare(&client, &repo).await?;

    let response = client.search(SearchRequest::new("update readme")).await?;
    assert_eq!(response.hits[0].record.message, "update readme");
    assert_eq!(response.hits[1].record.message, "update readme");
    assert_eq!(response.hits[0].record.timestamp, BASE_TIME);
    assert_eq!(response.hits[1].record.timestamp, BASE_TIME + 120);
    Ok(())
}

#[tokio::test]
async fn test_search_selects_repository() -> Result<()> {
    let dir = TempDir::new()?;
    let alpha = init_repo(dir.path(), "alpha", &["fix login bug"])?;
    let beta = init_repo(dir.path(), "beta", &["update docs"])?;
    let (client, _) = client(&dir.path().join("store"))?;
    prepare(&client, &alpha).await?;
    prepare(&client, &beta).await?;

    let latest = client.search(SearchRequest::new("login")).await?;
    assert_eq!(latest.artifact.repo_name, "beta");

    let mut request = SearchRequest::new("login");
    request.repo = Some("alpha".to_string());
    let response = client.search(request).await?;
    assert_eq!(response.artifact.repo_name, "alpha");
    assert_eq!(response.hits[0].record.message, "fix login bug");
    Ok(())
}

#[tokio::test]
async fn test_cleanup_empties_store() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, _) = client(&dir.path().join("store"))?;
    prepare(&client, &repo).await?;
    prepare(&client, &repo).await?;

    let report = client.cleanup().await?;
    assert_eq!(report.artifacts_removed, 2);
    assert!(client.list_embeddings().await?.is_empty());

    let again = client.cleanup().await?;
    assert_eq!(again.artifacts_removed, 0);
    assert_eq!(again.staging_removed, 0);

    let result = client.search(SearchRequest::new("login")).await;
    assert!(matches!(
        result,
        Err(GitSearchError::Store(StoreError::NoEmbeddingsFound { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_missing_openai_credential_leaves_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;

    let mut config = Config::with_store_root(dir.path().join("store"));
    config.embedding.provider = "openai".to_string();
    config.embedding.model = "text-embedding-3-small".to_string();
    config.embedding.api_key_env = "GIT_GPT_SEARCH_TEST_UNSET_KEY_9".to_string();
    let client = git_gpt_search::GitSearchClient::with_config(config)?;

    let result = prepare(&client, &repo).await;
    let err = result.expect_err("prepare without a credential must fail");
    assert!(matches!(
        err.downcast_ref::<GitSearchError>(),
        Some(GitSearchError::Embedding(
            EmbeddingError::MissingCredential { .. }
        ))
    ));
    assert!(client.list_embeddings().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_summary_failure_still_returns_hits() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = init_repo(dir.path(), "demo", &HISTORY)?;
    let (client, _) = client(&dir.path().join("store"))?;
    prepare(&client, &repo).await?;

    let mut request = SearchRequest::new("login bug");
    request.summarize = true;
    let response = client.search(request).await?;
    assert!(!response.hits.is_empty());
    match &response.summary {
        SummaryOutcome::Failed { warning } => {
            let expected = SummarizerError::MissingCredential {
                provider: "openai".to_string(),
                env_var: "GIT_GPT_SEARCH_TEST_UNSET_LLM_KEY".to_string(),
            };
            assert_eq!(warning, &expected.to_string());
        }
        other => panic!("expected a degraded summary, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = Config::with_store_root(dir.path().join("store"));
    config.embedding.batch_size = 0;
    assert!(client_with_config(config).is_err());
    Ok(())
}
