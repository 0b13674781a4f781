use super::{EmbeddingProvider, ProviderKind, check_input_lengths};
use crate::error::EmbeddingError;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// Longest commit message (in characters) passed to a local model
const MAX_INPUT_CHARS: usize = 6000;

/// FastEmbed-based embedding provider for Hugging Face models (`hf`)
///
/// The ONNX model is loaded on the first `embed` call, so construction is cheap
/// and model download latency lands on the first batch.
pub struct FastEmbedManager {
    model_id: String,
    model: EmbeddingModel,
    dimension: usize,
    batch_size: usize,
    embedder: Arc<Mutex<Option<TextEmbedding>>>,
}

impl FastEmbedManager {
    /// Create a manager for a Hugging Face model id such as `BAAI/bge-small-en-v1.5`
    pub fn new(model_id: &str, batch_size: usize) -> Result<Self, EmbeddingError> {
        let (model, dimension) = resolve_model(model_id)?;
        tracing::debug!(
            "Resolved {} to fastembed model {:?} ({} dims)",
            model_id,
            model,
            dimension
        );

        Ok(Self {
            model_id: model_id.to_string(),
            model,
            dimension,
            batch_size: batch_size.max(1),
            embedder: Arc::new(Mutex::new(None)),
        })
    }

    /// Get the dimension of the embeddings
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Map a Hugging Face model id onto fastembed's catalogue
fn resolve_model(model_id: &str) -> Result<(EmbeddingModel, usize), EmbeddingError> {
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| info.model_code.eq_ignore_ascii_case(model_id.trim()))
        .map(|info| (info.model, info.dim))
        .ok_or_else(|| EmbeddingError::UnknownModel {
            provider: ProviderKind::HuggingFace.to_string(),
            model: model_id.to_string(),
        })
}

#[async_trait]
impl EmbeddingProvider for FastEmbedManager {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        check_input_lengths(texts, MAX_INPUT_CHARS)?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let embedder = Arc::clone(&self.embedder);
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        let embeddings = tokio::task::spawn_blocking(move || {
            let mut guard = embedder
                .lock()
                .map_err(|e| EmbeddingError::LockPoisoned(e.to_string()))?;

            if guard.is_none() {
                tracing::info!("Initializing FastEmbed model: {:?}", model);
                let options = InitOptions::new(model).with_show_download_progress(false);
                let loaded = TextEmbedding::try_new(options)
                    .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;
                *guard = Some(loaded);
            }

            let text_embedding = guard.as_mut().ok_or_else(|| {
                EmbeddingError::InitializationFailed("model was not loaded".to_string())
            })?;

            text_embedding
                .embed(texts, Some(batch_size))
                .map_err(|e| EmbeddingError::ProviderError(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::ProviderError(format!("embedding task failed: {}", e)))??;

        if let Some(actual) = embeddings
            .iter()
            .map(Vec::len)
            .find(|len| *len != self.dimension)
        {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }

        Ok(embeddings)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }

    fn max_input_chars(&self) -> usize {
        MAX_INPUT_CHARS
    }
}
