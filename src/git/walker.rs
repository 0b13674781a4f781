use crate::error::GitError;
use crate::types::CommitRecord;
use git2::{BranchType, ErrorCode, Repository, Sort};
use std::path::{Path, PathBuf};

/// Name used for the branch field when HEAD is detached
pub const DETACHED_HEAD: &str = "HEAD";

/// Filters applied while walking history
#[derive(Debug, Clone, Default)]
pub struct CommitQuery {
    /// Local branch to start from (HEAD when `None`)
    pub branch: Option<String>,
    /// Stop after this many commits
    pub max_commits: Option<usize>,
    /// Skip commits older than this Unix timestamp
    pub since: Option<i64>,
    /// Skip commits newer than this Unix timestamp
    pub until: Option<i64>,
}

/// Read-only walker over a repository's commit history
pub struct GitWalker {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitWalker {
    /// Open the repository rooted at exactly `path`
    ///
    /// Parent directories are not searched, so a subdirectory of a work tree is
    /// rejected like any other non-repository path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        if !path.exists() {
            return Err(GitError::NotAGitRepository(display));
        }

        let repo = Repository::open(path).map_err(|e| match e.code() {
            ErrorCode::NotFound => GitError::NotAGitRepository(display.clone()),
            _ => GitError::OpenFailed(format!("{}: {}", display, e.message())),
        })?;

        // Accept the work tree root or the git dir itself, nothing nested
        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();
        if !same_dir(&root, path) && !same_dir(repo.path(), path) {
            return Err(GitError::NotAGitRepository(display));
        }

        tracing::info!("Opened git repository at: {}", root.display());

        Ok(Self {
            repo,
            repo_path: root,
        })
    }

    /// Get the repository root path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Directory name identifying the repository (`.git` suffix stripped for bare repos)
    pub fn repo_name(&self) -> String {
        let name = self
            .repo_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.repo_path.display().to_string());
        match name.strip_suffix(".git") {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => name,
        }
    }

    /// Current branch name, or `HEAD` when detached
    pub fn current_branch(&self) -> Result<String, GitError> {
        if self.repo.head_detached().unwrap_or(false) {
            return Ok(DETACHED_HEAD.to_string());
        }
        match self.repo.head() {
            Ok(head) => Ok(head.shorthand().unwrap_or(DETACHED_HEAD).to_string()),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                Err(GitError::NoCommitsFound(self.repo_path.display().to_string()))
            }
            Err(e) => Err(GitError::OpenFailed(e.message().to_string())),
        }
    }

    /// Walk history newest-first and collect matching commits
    pub fn commits(&self, query: &CommitQuery) -> Result<Vec<CommitRecord>, GitError> {
        let walk_err = |e: git2::Error| GitError::WalkFailed(e.message().to_string());

        let mut revwalk = self.repo.revwalk().map_err(walk_err)?;
        revwalk
            .set_sorting(Sort::TIME | Sort::TOPOLOGICAL)
            .map_err(walk_err)?;

        let branch = match &query.branch {
            Some(name) => {
                let reference = self
                    .repo
                    .find_branch(name, BranchType::Local)
                    .map_err(|_| GitError::BranchNotFound(name.clone()))?;
                let oid = reference
                    .get()
                    .target()
                    .ok_or_else(|| GitError::BranchNotFound(name.clone()))?;
                revwalk.push(oid).map_err(walk_err)?;
                name.clone()
            }
            None => {
                let branch = self.current_branch()?;
                revwalk.push_head().map_err(|e| match e.code() {
                    ErrorCode::UnbornBranch | ErrorCode::NotFound => {
                        GitError::NoCommitsFound(self.repo_path.display().to_string())
                    }
                    _ => walk_err(e),
                })?;
                branch
            }
        };

        let max = query.max_commits.unwrap_or(usize::MAX);
        let mut records = Vec::new();

        for oid in revwalk {
            if records.len() >= max {
                break;
            }

            let oid = oid.map_err(walk_err)?;
            let commit = self.repo.find_commit(oid).map_err(walk_err)?;
            let commit_time = commit.time().seconds();

            if let Some(since) = query.since
                && commit_time < since
            {
                continue;
            }
            if let Some(until) = query.until
                && commit_time > until
            {
                continue;
            }

            records.push(to_record(&commit, &branch));

            if records.len() % 500 == 0 {
                tracing::debug!("Extracted {} commits", records.len());
            }
        }

        tracing::info!(
            "Extracted {} commits from {} ({})",
            records.len(),
            self.repo_name(),
            branch
        );
        Ok(records)
    }
}

fn to_record(commit: &git2::Commit, branch: &str) -> CommitRecord {
    let author = commit.author();
    let message = String::from_utf8_lossy(commit.message_bytes())
        .trim_end()
        .to_string();

    CommitRecord {
        id: commit.id().to_string(),
        author: String::from_utf8_lossy(author.name_bytes()).into_owned(),
        author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
        timestamp: commit.time().seconds(),
        message,
        branch: branch.to_string(),
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
