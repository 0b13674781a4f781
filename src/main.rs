//! git-gpt-search - Semantic search over git commit history

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use git_gpt_search::{
    ArtifactMetadata, Config, GitSearchClient, GitSearchError, PrepareRequest, SearchRequest,
    SearchResponse, SummaryOutcome,
};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status for bad input or missing setup, distinct from runtime failures
const USAGE_FAILURE: u8 = 2;
const RUNTIME_FAILURE: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("git_gpt_search=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(report_failure(&err)),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = GitSearchClient::with_config(load_config(&cli)?)
        .context("Failed to initialize git-gpt-search")?;

    match cli.command {
        Commands::Prepare {
            path,
            provider,
            model,
            branch,
            max_commits,
            since,
            until,
        } => {
            let request = PrepareRequest {
                path,
                provider,
                model,
                branch,
                max_commits,
                since,
                until,
            };

            let cancel = CancellationToken::new();
            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Interrupted, rolling back prepare");
                        cancel.cancel();
                    }
                }
            });

            let response = client.prepare(request, cancel).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!(
                    "Prepared {} commits of {} ({}) in {} ms",
                    response.artifact.document_count,
                    response.artifact.repo_name,
                    response.artifact.branch,
                    response.duration_ms
                );
                println!("Stored at {}", response.artifact.storage_path);
            }
        }
        Commands::Search {
            query,
            repo,
            provider,
            model,
            summarize,
            llm_provider,
            llm_model,
            limit,
        } => {
            let request = SearchRequest {
                query,
                repo,
                provider,
                model,
                limit,
                summarize,
                llm_provider,
                llm_model,
            };
            let response = client.search(request).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_search(&response);
            }
        }
        Commands::ListEmbeddings => {
            let artifacts = client.list_embeddings().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&artifacts)?);
            } else if artifacts.is_empty() {
                println!("No embeddings found. Run `git-gpt-search prepare <path>` first.");
            } else {
                for artifact in &artifacts {
                    print_artifact(artifact);
                }
            }
        }
        Commands::Cleanup => {
            let report = client.cleanup().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Removed {} embeddings and {} staging directories",
                    report.artifacts_removed, report.staging_removed
                );
            }
        }
    }

    Ok(())
}

/// Caller mistakes get a one-line message; everything else the full cause chain
fn report_failure(err: &anyhow::Error) -> u8 {
    let known = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<GitSearchError>());
    match known {
        Some(e) if e.is_user_error() => {
            eprintln!("error: {}", e);
            USAGE_FAILURE
        }
        Some(e) => {
            eprintln!("error: {:#}", err);
            if e.is_retryable() {
                eprintln!("hint: this failure looks transient, retrying may succeed");
            }
            RUNTIME_FAILURE
        }
        None => {
            eprintln!("error: {:#}", err);
            RUNTIME_FAILURE
        }
    }
}

/// CLI flags > environment > config file > defaults
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    if let Some(store) = &cli.store {
        config.storage.root_dir = store.clone();
    }
    Ok(config)
}

fn print_search(response: &SearchResponse) {
    println!(
        "Searching {} ({}, prepared {})",
        response.artifact.repo_name,
        response.artifact.branch,
        response.artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if response.hits.is_empty() {
        println!("No matching commits.");
    }
    for hit in &response.hits {
        let record = &hit.record;
        println!(
            "- {}: {} on {}: {}...",
            record.id,
            record.author,
            record.display_date(),
            record.preview()
        );
    }

    match &response.summary {
        SummaryOutcome::NotRequested => {}
        SummaryOutcome::Generated { text } => {
            println!();
            println!("LLM Answer");
            println!("----------");
            println!("{}", text);
        }
        SummaryOutcome::Failed { warning } => {
            eprintln!();
            eprintln!("Warning: summary unavailable: {}", warning);
        }
    }
}

fn print_artifact(artifact: &ArtifactMetadata) {
    println!("{} ({})", artifact.repo_name, artifact.artifact_id);
    println!("  branch:     {}", artifact.branch);
    println!(
        "  created at: {}",
        artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  provider:   {}", artifact.provider);
    println!("  model:      {}", artifact.model);
    println!("  documents:  {}", artifact.document_count);
    println!("  path:       {}", artifact.storage_path);
}
