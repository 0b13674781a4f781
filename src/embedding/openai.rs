//! OpenAI embeddings API adapter (`openai`).

use super::{EmbeddingProvider, ProviderKind, check_input_lengths};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Longest commit message (in characters) sent to the API
const MAX_INPUT_CHARS: usize = 30_000;

/// Sent in place of blank messages, which the API rejects
const BLANK_INPUT: &str = " ";

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// A failed request and whether another attempt could succeed
struct RequestFailure {
    error: EmbeddingError,
    retryable: bool,
}

impl RequestFailure {
    fn transient(error: EmbeddingError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: EmbeddingError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// Remote embedding provider calling `POST {base_url}/embeddings`
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    /// Build an embedder, reading the API key from the configured environment variable
    pub fn from_config(model: &str, config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EmbeddingError::MissingCredential {
                provider: ProviderKind::OpenAi.to_string(),
                env_var: config.api_key_env.clone(),
            })?;

        Self::new(
            model,
            SecretString::from(api_key),
            &config.openai_base_url,
            config.batch_size,
            config.max_retries,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        model: &str,
        api_key: SecretString,
        base_url: &str,
        batch_size: usize,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            batch_size: batch_size.max(1),
            max_retries: max_retries.max(1),
        })
    }

    /// Call the API with retry logic
    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, count = texts.len(), "Calling embeddings API");

            match self.make_request(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(failure) => {
                    if !failure.retryable || attempts >= self.max_retries {
                        error!(error = %failure.error, attempts, "Embeddings request failed");
                        return Err(failure.error);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %failure.error,
                                retry_in_ms = duration.as_millis(),
                                "Embeddings request failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => return Err(failure.error),
                    }
                }
            }
        }
    }

    /// Make a single API request
    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RequestFailure> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| RequestFailure::transient(EmbeddingError::ProviderError(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = EmbeddingError::ProviderError(format!("HTTP {}: {}", status, body));
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    RequestFailure::transient(err)
                } else {
                    RequestFailure::fatal(err)
                },
            );
        }

        let body: EmbeddingsResponse = response.json().await.map_err(|e| {
            RequestFailure::fatal(EmbeddingError::ProviderError(format!(
                "invalid response body: {}",
                e
            )))
        })?;

        reorder(body.data, texts.len()).map_err(RequestFailure::fatal)
    }
}

/// Empty or whitespace-only messages still get a vector
fn api_input(text: &str) -> String {
    if text.trim().is_empty() {
        BLANK_INPUT.to_string()
    } else {
        text.to_string()
    }
}

/// Place each returned vector at its `index`, rejecting gaps and duplicates
fn reorder(items: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if items.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: items.len(),
        });
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in items {
        let slot = slots
            .get_mut(item.index)
            .filter(|slot| slot.is_none())
            .ok_or_else(|| {
                EmbeddingError::ProviderError(format!(
                    "unexpected embedding index {}",
                    item.index
                ))
            })?;
        *slot = Some(item.embedding);
    }

    let vectors: Vec<Vec<f32>> = slots.into_iter().flatten().collect();
    if let Some(first) = vectors.first()
        && let Some(bad) = vectors.iter().find(|v| v.len() != first.len())
    {
        return Err(EmbeddingError::DimensionMismatch {
            expected: first.len(),
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        check_input_lengths(texts, MAX_INPUT_CHARS)?;

        let inputs: Vec<String> = texts.iter().map(|t| api_input(t)).collect();
        let mut vectors = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(self.batch_size) {
            vectors.extend(self.embed_chunk(chunk).await?);
        }
        Ok(vectors)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_input_chars(&self) -> usize {
        MAX_INPUT_CHARS
    }
}
