/// Configuration system for git-gpt-search
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::embedding::ProviderKind;
use crate::error::{ConfigError, GitSearchError};
use crate::summarizer::SummarizerKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Artifact storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// LLM summarizer configuration
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding artifacts, the staging area and the lock file
    #[serde(default = "default_store_root")]
    pub root_dir: PathBuf,

    /// How long cleanup waits for in-flight prepare/search runs to finish
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider tag: "hf" (local fastembed model) or "openai"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (e.g., "BAAI/bge-small-en-v1.5", "text-embedding-3-small")
    #[serde(default = "default_model")]
    pub model: String,

    /// Number of texts sent to the provider per call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for a single embedding batch
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Environment variable holding the OpenAI API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible embeddings API
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Maximum attempts for a remote embedding request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default result limit
    #[serde(default = "default_result_limit")]
    pub limit: usize,
}

/// LLM summarizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// LLM provider tag (currently only "openai")
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Chat model used for summaries
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum attempts for a summarization request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

// Default value functions
fn default_store_root() -> PathBuf {
    crate::paths::PlatformPaths::default_store_path()
}

fn default_lock_timeout() -> u64 {
    30
}

fn default_provider() -> String {
    "hf".to_string()
}

fn default_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    300 // first local call may download the model
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_result_limit() -> usize {
    5
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_model() -> String {
    "gpt-4.1-nano".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_store_root(),
            lock_timeout_secs: default_lock_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
            api_key_env: default_api_key_env(),
            openai_base_url: default_openai_base_url(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_result_limit(),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            base_url: default_openai_base_url(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Unparsable values are reported and ignored, keeping the configured size
fn parse_batch_size(raw: &str) -> Option<usize> {
    match raw.trim().parse() {
        Ok(size) => Some(size),
        Err(e) => {
            tracing::warn!(
                "Ignoring GIT_GPT_SEARCH_BATCH_SIZE={:?}: {}",
                raw,
                e
            );
            None
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> GitSearchError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, GitSearchError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or fall back to defaults
    pub fn load_or_default() -> Result<Self, GitSearchError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), GitSearchError> {
        if ProviderKind::from_str(&self.embedding.provider).is_err() {
            return Err(invalid(
                "embedding.provider",
                format!("must be 'hf' or 'openai', got '{}'", self.embedding.provider),
            ));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(invalid("embedding.model", "must not be empty"));
        }

        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be greater than 0"));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }

        if self.embedding.max_retries == 0 {
            return Err(invalid("embedding.max_retries", "must be at least 1"));
        }

        if self.search.limit == 0 {
            return Err(invalid("search.limit", "must be greater than 0"));
        }

        if SummarizerKind::from_str(&self.summarizer.provider).is_err() {
            return Err(invalid(
                "summarizer.provider",
                format!("must be 'openai', got '{}'", self.summarizer.provider),
            ));
        }

        if self.summarizer.timeout_secs == 0 {
            return Err(invalid("summarizer.timeout_secs", "must be greater than 0"));
        }

        if self.summarizer.max_retries == 0 {
            return Err(invalid("summarizer.max_retries", "must be at least 1"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("GIT_GPT_SEARCH_STORE") {
            self.storage.root_dir = PathBuf::from(root);
        }

        if let Ok(provider) = std::env::var("GIT_GPT_SEARCH_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("GIT_GPT_SEARCH_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(batch_size) = std::env::var("GIT_GPT_SEARCH_BATCH_SIZE")
            && let Some(size) = parse_batch_size(&batch_size)
        {
            self.embedding.batch_size = size;
        }

        if let Ok(model) = std::env::var("GIT_GPT_SEARCH_LLM_MODEL") {
            self.summarizer.model = model;
        }
    }

    /// Create a new Config with defaults, config file and environment overrides
    pub fn new() -> Result<Self, GitSearchError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration rooted at a custom store directory
    pub fn with_store_root(root_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.root_dir = root_dir.into();
        config
    }
}

#[cfg(test)]
mod tests;
