mod fastembed_manager;
mod openai;

pub use fastembed_manager::FastEmbedManager;
pub use openai::OpenAiEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Embedding backend family, selected by its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Local Hugging Face model executed with fastembed (`hf`)
    #[serde(rename = "hf")]
    HuggingFace,
    /// OpenAI embeddings API (`openai`)
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "hf",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hf" | "huggingface" => Ok(ProviderKind::HuggingFace),
            "openai" => Ok(ProviderKind::OpenAi),
            _ => Err(EmbeddingError::UnknownProvider(s.to_string())),
        }
    }
}

/// The `(provider, model)` pair that identifies a vector space
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddingSpec {
    pub provider: ProviderKind,
    pub model: String,
}

impl EmbeddingSpec {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Parse a provider tag and pair it with a model identifier
    pub fn parse(provider: &str, model: &str) -> Result<Self, EmbeddingError> {
        let provider = ProviderKind::from_str(provider)?;
        if model.trim().is_empty() {
            return Err(EmbeddingError::UnknownModel {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }
        Ok(Self::new(provider, model.trim()))
    }
}

impl fmt::Display for EmbeddingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Trait for embedding generation
///
/// Implementations are order-preserving: `result[i]` is the vector of `texts[i]`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Backend family of this provider
    fn provider(&self) -> ProviderKind;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Longest input (in characters) the provider accepts
    fn max_input_chars(&self) -> usize;
}

/// Builds embedding providers from `(provider, model)` tags
pub trait EmbeddingProviderFactory: Send + Sync {
    fn create(&self, spec: &EmbeddingSpec) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError>;
}

/// Factory producing the shipped fastembed and OpenAI providers
#[derive(Debug, Clone)]
pub struct DefaultProviderFactory {
    config: EmbeddingConfig,
}

impl DefaultProviderFactory {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }
}

impl EmbeddingProviderFactory for DefaultProviderFactory {
    fn create(&self, spec: &EmbeddingSpec) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        tracing::debug!("Creating embedding provider {}", spec);
        match spec.provider {
            ProviderKind::HuggingFace => Ok(Arc::new(FastEmbedManager::new(
                &spec.model,
                self.config.batch_size,
            )?)),
            ProviderKind::OpenAi => Ok(Arc::new(OpenAiEmbedder::from_config(
                &spec.model,
                &self.config,
            )?)),
        }
    }
}

/// Fail with `InputTooLong` if any text exceeds `max` characters
pub fn check_input_lengths(texts: &[String], max: usize) -> Result<(), EmbeddingError> {
    for (index, text) in texts.iter().enumerate() {
        let len = text.chars().count();
        if len > max {
            return Err(EmbeddingError::InputTooLong { index, len, max });
        }
    }
    Ok(())
}

/// Cut `text` down to at most `max_chars` characters, on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Run one provider call, bounded by `timeout`
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let vectors = tokio::time::timeout(timeout, provider.embed(texts))
        .await
        .map_err(|_| EmbeddingError::Timeout(timeout.as_secs()))??;

    if vectors.len() != texts.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}
