//! CLI argument parsing using clap

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// git-gpt-search - Semantic search over git commit history
///
/// Embeds commit messages into a local store, then ranks commits by
/// similarity to a question and can ask an LLM to summarize the matches.
#[derive(Parser, Debug)]
#[command(name = "git-gpt-search")]
#[command(author, version = VERSION, about, long_about = None)]
pub struct Cli {
    /// Store directory (overrides config and GIT_GPT_SEARCH_STORE)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Config file to load instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed the commit history of a repository
    Prepare {
        /// Path to the repository (working tree root or .git directory)
        path: String,

        /// Embedding provider: hf or openai
        #[arg(short, long)]
        provider: Option<String>,

        /// Embedding model
        #[arg(short, long)]
        model: Option<String>,

        /// Branch to walk instead of the checked-out one
        #[arg(short, long)]
        branch: Option<String>,

        /// Embed at most this many commits, newest first
        #[arg(long)]
        max_commits: Option<usize>,

        /// Only commits on or after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_timestamp)]
        since: Option<i64>,

        /// Only commits on or before this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_until)]
        until: Option<i64>,
    },

    /// Search the latest embeddings with a natural-language question
    Search {
        /// Question, at most 200 characters
        query: String,

        /// Repository name to search (default: most recently prepared)
        #[arg(short, long)]
        repo: Option<String>,

        /// Embedding provider the artifact was prepared with
        #[arg(short, long)]
        provider: Option<String>,

        /// Embedding model the artifact was prepared with
        #[arg(short, long)]
        model: Option<String>,

        /// Ask an LLM to summarize the matching commits
        #[arg(short, long)]
        summarize: bool,

        /// LLM provider used with --summarize
        #[arg(long)]
        llm_provider: Option<String>,

        /// LLM model used with --summarize
        #[arg(long)]
        llm_model: Option<String>,

        /// Maximum number of commits to return
        #[arg(short = 'k', long)]
        limit: Option<usize>,
    },

    /// List prepared embeddings, newest first
    ListEmbeddings,

    /// Delete every prepared embedding
    Cleanup,
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Lower bound: a calendar date means its first second (midnight UTC)
fn parse_timestamp(value: &str) -> Result<i64, String> {
    parse_bound(value, 0)
}

/// Upper bound: a calendar date means its last second, so the whole day is included
fn parse_until(value: &str) -> Result<i64, String> {
    parse_bound(value, SECONDS_PER_DAY - 1)
}

/// RFC 3339 timestamps are taken as is; bare dates get `day_offset` added to midnight
fn parse_bound(value: &str, day_offset: i64) -> Result<i64, String> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| {
            let midnight: NaiveDateTime = date.and_hms_opt(0, 0, 0).unwrap_or_default();
            Utc.from_utc_datetime(&midnight).timestamp() + day_offset
        })
        .map_err(|_| format!("expected YYYY-MM-DD or RFC 3339, got '{}'", value))
}
