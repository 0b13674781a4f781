//! Shared fixtures: throwaway repositories and a deterministic embedder

#![allow(dead_code)]

use async_trait::async_trait;
use git2::{Repository, Signature, Time};
use git_gpt_search::config::Config;
use git_gpt_search::embedding::{
    EmbeddingProvider, EmbeddingProviderFactory, EmbeddingSpec, ProviderKind,
};
use git_gpt_search::error::EmbeddingError;
use git_gpt_search::summarizer::{DefaultSummarizerFactory, SummarizerFactory};
use git_gpt_search::GitSearchClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DIMENSION: usize = 128;
pub const BASE_TIME: i64 = 1_700_000_000;

/// Hashed bag-of-words vectors with a constant bias in dimension 0
pub struct BagOfWordsEmbedder {
    spec: EmbeddingSpec,
    calls: Arc<AtomicUsize>,
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    vector[0] = 1.0;
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        vector[(fnv1a(word) % (DIMENSION as u64 - 1)) as usize + 1] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }

    fn provider(&self) -> ProviderKind {
        self.spec.provider
    }

    fn model_name(&self) -> &str {
        &self.spec.model
    }

    fn max_input_chars(&self) -> usize {
        4096
    }
}

/// Hands out `BagOfWordsEmbedder`s for any spec and counts their calls
#[derive(Default)]
pub struct BagOfWordsFactory {
    pub calls: Arc<AtomicUsize>,
}

impl BagOfWordsFactory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProviderFactory for BagOfWordsFactory {
    fn create(&self, spec: &EmbeddingSpec) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        Ok(Arc::new(BagOfWordsEmbedder {
            spec: spec.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

/// Create `{root}/{name}` with one commit per message, a minute apart
pub fn init_repo(root: &Path, name: &str, messages: &[&str]) -> anyhow::Result<PathBuf> {
    let path = root.join(name);
    let repo = Repository::init(&path)?;
    let mut parent: Option<git2::Oid> = None;
    for (i, message) in messages.iter().enumerate() {
        let sig = Signature::new(
            "Test Author",
            "author@example.com",
            &Time::new(BASE_TIME + i as i64 * 60, 0),
        )?;
        let tree_id = repo.index()?.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let parents = match parent {
            Some(oid) => vec![repo.find_commit(oid)?],
            None => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        parent = Some(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?);
    }
    Ok(path)
}

/// Client over `store` with the bag-of-words embedder and the shipped summarizer
pub fn client(store: &Path) -> anyhow::Result<(GitSearchClient, Arc<BagOfWordsFactory>)> {
    let mut config = Config::with_store_root(store);
    config.storage.lock_timeout_secs = 2;
    // Unset on purpose: summaries fail unless a test opts in
    config.summarizer.api_key_env = "GIT_GPT_SEARCH_TEST_UNSET_LLM_KEY".to_string();
    client_with_config(config)
}

pub fn client_with_config(
    config: Config,
) -> anyhow::Result<(GitSearchClient, Arc<BagOfWordsFactory>)> {
    let factory = Arc::new(BagOfWordsFactory::default());
    let summarizer: Arc<dyn SummarizerFactory> =
        Arc::new(DefaultSummarizerFactory::new(config.summarizer.clone()));
    let client = GitSearchClient::with_factories(config, factory.clone(), summarizer)?;
    Ok((client, factory))
}
