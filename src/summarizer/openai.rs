use super::{SYSTEM_PROMPT, Summarizer, SummarizerKind, build_user_prompt};
use crate::config::SummarizerConfig;
use crate::error::SummarizerError;
use crate::types::CommitRecord;
use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A failed call and whether another attempt may succeed
#[derive(Debug)]
struct RequestFailure {
    error: SummarizerError,
    retryable: bool,
}

impl RequestFailure {
    fn transient(error: SummarizerError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: SummarizerError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// Chat-completions summarizer for OpenAI-compatible endpoints
pub struct OpenAiSummarizer {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    max_retries: u32,
}

impl OpenAiSummarizer {
    /// Build a summarizer, reading the API key from the configured environment variable
    pub fn from_config(model: &str, config: &SummarizerConfig) -> Result<Self, SummarizerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SummarizerError::MissingCredential {
                provider: SummarizerKind::OpenAi.to_string(),
                env_var: config.api_key_env.clone(),
            })?;

        Self::new(
            model,
            SecretString::from(api_key),
            &config.base_url,
            config.max_retries,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        model: &str,
        api_key: SecretString,
        base_url: &str,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SummarizerError::ProviderError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            max_retries: max_retries.max(1),
        })
    }

    /// Make a single API request
    async fn make_request(&self, user_prompt: &str) -> Result<String, RequestFailure> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url);
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
            .map_err(|e| RequestFailure::transient(SummarizerError::ProviderError(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = SummarizerError::ProviderError(format!("HTTP {}: {}", status, body));
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    RequestFailure::transient(err)
                } else {
                    RequestFailure::fatal(err)
                },
            );
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            RequestFailure::fatal(SummarizerError::ProviderError(format!(
                "invalid response body: {}",
                e
            )))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(RequestFailure::fatal(SummarizerError::EmptyResponse))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(
        &self,
        query: &str,
        documents: &[CommitRecord],
    ) -> Result<String, SummarizerError> {
        if documents.is_empty() {
            return Err(SummarizerError::NoDocuments);
        }

        let prompt = build_user_prompt(query, documents);
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model = %self.model, "Calling chat completions API");

            match self.make_request(&prompt).await {
                Ok(answer) => return Ok(answer),
                Err(RequestFailure {
                    error: e,
                    retryable,
                }) => {
                    if !retryable || attempts >= self.max_retries {
                        error!(error = %e, attempts, "Summarization failed");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Summarization failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }
}
