//! LLM summarization of search results.
//!
//! A `Summarizer` turns the ranked commits of a search into a short
//! natural-language answer. Variants are chosen by their provider tag through
//! a `SummarizerFactory`, so tests can inject their own.

mod openai;

pub use openai::OpenAiSummarizer;

use crate::config::SummarizerConfig;
use crate::error::SummarizerError;
use crate::types::CommitRecord;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Instructions given to the model ahead of the commit list
pub const SYSTEM_PROMPT: &str = "You are a helpful Engineer who understands how development works \
and answers questions about git commit changes. You are concise, accurate, and explain all commit \
messages which are relevant to the question clearly using developer-friendly language and provide \
all relevant details including the commit hash, author, date, and message. Answer only based on \
the commit messages provided. If you don't know the answer, say so.";

/// LLM backend family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummarizerKind {
    OpenAi,
}

impl SummarizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarizerKind::OpenAi => "openai",
        }
    }
}

impl fmt::Display for SummarizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummarizerKind {
    type Err = SummarizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(SummarizerKind::OpenAi),
            _ => Err(SummarizerError::UnknownProvider(s.to_string())),
        }
    }
}

/// Pluggable summarizer
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Answer `query` using only the given commits
    async fn summarize(
        &self,
        query: &str,
        documents: &[CommitRecord],
    ) -> Result<String, SummarizerError>;
}

/// Builds summarizers from `(llm_provider, llm_model)` tags
pub trait SummarizerFactory: Send + Sync {
    fn create(
        &self,
        kind: SummarizerKind,
        model: &str,
    ) -> Result<Arc<dyn Summarizer>, SummarizerError>;
}

/// Factory producing the shipped OpenAI summarizer
#[derive(Debug, Clone)]
pub struct DefaultSummarizerFactory {
    config: SummarizerConfig,
}

impl DefaultSummarizerFactory {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }
}

impl SummarizerFactory for DefaultSummarizerFactory {
    fn create(
        &self,
        kind: SummarizerKind,
        model: &str,
    ) -> Result<Arc<dyn Summarizer>, SummarizerError> {
        match kind {
            SummarizerKind::OpenAi => Ok(Arc::new(OpenAiSummarizer::from_config(
                model,
                &self.config,
            )?)),
        }
    }
}

/// One prompt line per commit: hash, author, date and message preview
pub fn format_commits(documents: &[CommitRecord]) -> String {
    documents
        .iter()
        .map(|doc| {
            format!(
                "-commit: {}: author: {}, date: {}, message: {}...",
                doc.id,
                doc.author,
                doc.display_date(),
                doc.preview()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// User message carrying the commits and the question
pub fn build_user_prompt(query: &str, documents: &[CommitRecord]) -> String {
    format!(
        "Commit Messages:\n{}\n\nQuestion:\n{}",
        format_commits(documents),
        query
    )
}
