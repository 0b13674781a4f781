/// Centralized error types for git-gpt-search using thiserror
///
/// Every pipeline component owns an error enum. `GitSearchError` wraps them so
/// callers can tell which component failed and print a message naming it.
use thiserror::Error;

/// Main error type for the search pipeline
#[derive(Error, Debug)]
pub enum GitSearchError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Summarizer error: {0}")]
    Summarizer(#[from] SummarizerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while reading repository history
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {0}")]
    NotAGitRepository(String),

    #[error("Failed to open git repository: {0}")]
    OpenFailed(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Failed to walk commit history: {0}")]
    WalkFailed(String),

    #[error("Repository has no commits: {0}")]
    NoCommitsFound(String),
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Unknown embedding provider '{0}' (expected 'hf' or 'openai')")]
    UnknownProvider(String),

    #[error("Model '{model}' is not supported by provider '{provider}'")]
    UnknownModel { provider: String, model: String },

    #[error("Missing credential for provider '{provider}': set the {env_var} environment variable")]
    MissingCredential { provider: String, env_var: String },

    #[error("Input {index} is {len} characters long, provider limit is {max}")]
    InputTooLong { index: usize, len: usize, max: usize },

    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Embedding provider request failed: {0}")]
    ProviderError(String),

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to artifact storage, the registry and cleanup
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write artifact at '{path}': {reason}")]
    WriteFailure { path: String, reason: String },

    #[error("Failed to read artifact at '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Artifact metadata at '{path}' is corrupted: {reason}")]
    CorruptMetadata { path: String, reason: String },

    #[error(
        "No embeddings found{}. Run 'prepare' first",
        .repo.as_deref().map(|r| format!(" for repository '{r}'")).unwrap_or_default()
    )]
    NoEmbeddingsFound { repo: Option<String> },

    #[error("Invalid artifact contents: {0}")]
    InvalidArtifact(String),

    #[error("Failed to delete '{path}': {reason}")]
    DeleteFailed { path: String, reason: String },

    #[error("Store is busy: {0}")]
    StoreBusy(String),
}

/// Errors related to LLM summarization
#[derive(Error, Debug)]
pub enum SummarizerError {
    #[error("Unknown LLM provider '{0}' (expected 'openai')")]
    UnknownProvider(String),

    #[error("Missing credential for LLM provider '{provider}': set the {env_var} environment variable")]
    MissingCredential { provider: String, env_var: String },

    #[error("LLM provider request failed: {0}")]
    ProviderError(String),

    #[error("LLM provider returned an empty answer")]
    EmptyResponse,

    #[error("No commits to summarize")]
    NoDocuments,
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to request validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Query is {len} characters long, maximum is {max}")]
    QueryTooLong { len: usize, max: usize },

    #[error("Query is empty")]
    EmptyQuery,

    #[error("limit must be at least 1, got {0}")]
    InvalidLimit(usize),

    #[error(
        "Latest embeddings were built with {stored_provider}/{stored_model} but {requested_provider}/{requested_model} was requested; re-run 'prepare' with the requested provider or search with the stored one"
    )]
    ProviderMismatch {
        stored_provider: String,
        stored_model: String,
        requested_provider: String,
        requested_model: String,
    },
}

// Conversion from anyhow::Error to GitSearchError
impl From<anyhow::Error> for GitSearchError {
    fn from(err: anyhow::Error) -> Self {
        GitSearchError::Other(format!("{:#}", err))
    }
}

impl GitSearchError {
    /// Check if this is a caller error (bad input, missing setup) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GitSearchError::Validation(_)
                | GitSearchError::Git(GitError::NotAGitRepository(_))
                | GitSearchError::Git(GitError::BranchNotFound(_))
                | GitSearchError::Store(StoreError::NoEmbeddingsFound { .. })
                | GitSearchError::Embedding(EmbeddingError::MissingCredential { .. })
                | GitSearchError::Embedding(EmbeddingError::UnknownProvider(_))
                | GitSearchError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is transient and the operation may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GitSearchError::Embedding(EmbeddingError::ProviderError(_))
                | GitSearchError::Embedding(EmbeddingError::Timeout(_))
                | GitSearchError::Summarizer(SummarizerError::ProviderError(_))
                | GitSearchError::Store(StoreError::StoreBusy(_))
                | GitSearchError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_component() {
        let err = GitSearchError::Git(GitError::NotAGitRepository("/tmp/x".to_string()));
        assert_eq!(err.to_string(), "Git error: Not a git repository: /tmp/x");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GitSearchError = io_err.into();
        assert!(matches!(err, GitSearchError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: GitSearchError = anyhow::anyhow!("test error").into();
        assert!(matches!(err, GitSearchError::Other(_)));
    }

    #[test]
    fn test_no_embeddings_found_message() {
        let err = StoreError::NoEmbeddingsFound {
            repo: Some("my-repo".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "No embeddings found for repository 'my-repo'. Run 'prepare' first"
        );

        let err = StoreError::NoEmbeddingsFound { repo: None };
        assert_eq!(err.to_string(), "No embeddings found. Run 'prepare' first");
    }

    #[test]
    fn test_missing_credential_message() {
        let err = EmbeddingError::MissingCredential {
            provider: "openai".to_string(),
            env_var: "OPENAI_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_query_too_long_message() {
        let err = ValidationError::QueryTooLong { len: 250, max: 200 };
        assert_eq!(
            err.to_string(),
            "Query is 250 characters long, maximum is 200"
        );
    }

    #[test]
    fn test_provider_mismatch_names_both_pairs() {
        let err = ValidationError::ProviderMismatch {
            stored_provider: "hf".to_string(),
            stored_model: "BAAI/bge-small-en-v1.5".to_string(),
            requested_provider: "openai".to_string(),
            requested_model: "text-embedding-3-small".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("hf/BAAI/bge-small-en-v1.5"));
        assert!(msg.contains("openai/text-embedding-3-small"));
    }

    #[test]
    fn test_is_user_error() {
        let user_err: GitSearchError = ValidationError::EmptyQuery.into();
        assert!(user_err.is_user_error());

        let missing: GitSearchError = StoreError::NoEmbeddingsFound { repo: None }.into();
        assert!(missing.is_user_error());

        let system_err = GitSearchError::Io(std::io::Error::other("disk"));
        assert!(!system_err.is_user_error());
    }

    #[test]
    fn test_is_retryable() {
        let retryable: GitSearchError =
            EmbeddingError::ProviderError("503 Service Unavailable".to_string()).into();
        assert!(retryable.is_retryable());

        let not_retryable: GitSearchError =
            ValidationError::QueryTooLong { len: 201, max: 200 }.into();
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_error_chain() {
        let err: GitSearchError = StoreError::WriteFailure {
            path: "/store/staging/x".to_string(),
            reason: "No space left on device".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Store error: Failed to write artifact at '/store/staging/x': No space left on device"
        );
    }
}
