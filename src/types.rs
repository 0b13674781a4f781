use crate::error::ValidationError;
use crate::store::ArtifactMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum query length accepted by `search`, in characters
pub const MAX_QUERY_CHARS: usize = 200;

/// One commit extracted from repository history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit SHA hash (40 characters)
    pub id: String,
    /// Author's name
    pub author: String,
    /// Author's email address
    pub author_email: String,
    /// Commit timestamp (Unix epoch seconds)
    pub timestamp: i64,
    /// Full commit message with trailing whitespace trimmed
    pub message: String,
    /// Branch that was checked out (or requested) at extraction time
    pub branch: String,
}

impl CommitRecord {
    /// First line of the message, used for compact listings
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// First line of at most the first 100 characters of the message
    pub fn preview(&self) -> &str {
        crate::embedding::truncate_chars(&self.message, PREVIEW_CHARS)
            .lines()
            .next()
            .unwrap_or("")
    }

    /// Commit time as a UTC datetime
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// Commit time formatted for listings and prompts
    pub fn display_date(&self) -> String {
        self.committed_at()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

const PREVIEW_CHARS: usize = 100;

/// Request to extract and embed a repository's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    /// Path to the repository root
    pub path: String,
    /// Provider tag ("hf" or "openai"); falls back to the configured one
    #[serde(default)]
    pub provider: Option<String>,
    /// Model identifier; falls back to the configured one
    #[serde(default)]
    pub model: Option<String>,
    /// Local branch to walk instead of HEAD
    #[serde(default)]
    pub branch: Option<String>,
    /// Stop after this many commits (newest first)
    #[serde(default)]
    pub max_commits: Option<usize>,
    /// Only include commits at or after this Unix timestamp
    #[serde(default)]
    pub since: Option<i64>,
    /// Only include commits at or before this Unix timestamp
    #[serde(default)]
    pub until: Option<i64>,
}

impl PrepareRequest {
    /// Request with every optional field left to configuration defaults
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            provider: None,
            model: None,
            branch: None,
            max_commits: None,
            since: None,
            until: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_commits == Some(0) {
            return Err(ValidationError::InvalidLimit(0));
        }
        Ok(())
    }
}

/// Result of a successful prepare run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareResponse {
    /// Metadata of the newly committed artifact
    pub artifact: ArtifactMetadata,
    /// Number of commits read from history
    pub commits_extracted: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Request to search the latest artifact of a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Natural-language question (at most 200 characters)
    pub query: String,
    /// Repository name to search; newest artifact of any repository when absent
    #[serde(default)]
    pub repo: Option<String>,
    /// Provider tag; must match the artifact's provider
    #[serde(default)]
    pub provider: Option<String>,
    /// Model identifier; must match the artifact's model
    #[serde(default)]
    pub model: Option<String>,
    /// Maximum number of results
    #[serde(default)]
    pub limit: Option<usize>,
    /// Ask the LLM for a synopsis of the results
    #[serde(default)]
    pub summarize: bool,
    /// LLM provider tag used when summarizing
    #[serde(default)]
    pub llm_provider: Option<String>,
    /// LLM model used when summarizing
    #[serde(default)]
    pub llm_model: Option<String>,
}

impl SearchRequest {
    /// Request with every optional field left to configuration defaults
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            repo: None,
            provider: None,
            model: None,
            limit: None,
            summarize: false,
            llm_provider: None,
            llm_model: None,
        }
    }

    /// Fail-fast checks that need no I/O
    pub fn validate(&self) -> Result<(), ValidationError> {
        let len = self.query.chars().count();
        if len > MAX_QUERY_CHARS {
            return Err(ValidationError::QueryTooLong {
                len,
                max: MAX_QUERY_CHARS,
            });
        }
        if self.query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if let Some(limit) = self.limit
            && limit == 0
        {
            return Err(ValidationError::InvalidLimit(limit));
        }
        Ok(())
    }
}

/// A single ranked commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: CommitRecord,
    /// Cosine similarity to the query (higher is better)
    pub score: f32,
}

/// Outcome of the optional summarization step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryOutcome {
    NotRequested,
    Generated { text: String },
    /// Summarization failed; the ranked hits are still valid
    Failed { warning: String },
}

/// Response from a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Artifact the results come from
    pub artifact: ArtifactMetadata,
    /// Hits sorted best-first
    pub hits: Vec<SearchHit>,
    pub summary: SummaryOutcome,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// What a cleanup run removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub artifacts_removed: usize,
    pub staging_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> CommitRecord {
        CommitRecord {
            id: "a".repeat(40),
            author: "Ada".to_string(),
            author_email: "ada@example.com".to_string(),
            timestamp: 1_704_067_200,
            message: message.to_string(),
            branch: "main".to_string(),
        }
    }

    #[test]
    fn test_subject_is_first_line() {
        let r = record("fix login bug\n\nThe session cookie expired too early.");
        assert_eq!(r.subject(), "fix login bug");
    }

    #[test]
    fn test_subject_of_empty_message() {
        assert_eq!(record("").subject(), "");
    }

    #[test]
    fn test_preview_caps_length_and_lines() {
        let long = format!("{}\nsecond line", "w".repeat(150));
        assert_eq!(record(&long).preview().chars().count(), 100);
        assert_eq!(record("short\nbody").preview(), "short");
    }

    #[test]
    fn test_display_date() {
        assert_eq!(record("init").display_date(), "2024-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_committed_at() {
        let r = record("init");
        assert_eq!(
            r.committed_at().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_search_request_validate_ok() {
        let req = SearchRequest::new("login bug");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_search_request_exactly_max_chars() {
        let req = SearchRequest::new("q".repeat(MAX_QUERY_CHARS));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_search_request_too_long() {
        let req = SearchRequest::new("q".repeat(MAX_QUERY_CHARS + 1));
        assert!(matches!(
            req.validate(),
            Err(ValidationError::QueryTooLong { len: 201, max: 200 })
        ));
    }

    #[test]
    fn test_search_request_counts_chars_not_bytes() {
        // 200 multi-byte characters are still within the limit
        let req = SearchRequest::new("é".repeat(MAX_QUERY_CHARS));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_search_request_empty_query() {
        let req = SearchRequest::new("   ");
        assert!(matches!(req.validate(), Err(ValidationError::EmptyQuery)));
    }

    #[test]
    fn test_search_request_zero_limit() {
        let mut req = SearchRequest::new("login");
        req.limit = Some(0);
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidLimit(0))
        ));
    }

    #[test]
    fn test_prepare_request_zero_max_commits() {
        let mut req = PrepareRequest::new(".");
        req.max_commits = Some(0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_summary_outcome_serialization() {
        let outcome = SummaryOutcome::Failed {
            warning: "no key".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
    }
}
