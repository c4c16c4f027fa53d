use flowscope_scanner::error::{FailureKind, GitHubError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid GitHub repository URL: {0}")]
    InvalidRepoUrl(String),

    #[error("Repository not found or not accessible: {0}")]
    RepositoryNotFound(String),

    #[error("GitHub API rate limit exceeded (resets at {reset_at}); supply a token to raise the limit")]
    RateLimited { reset_at: u64 },

    #[error("Repository analysis timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error(transparent)]
    GitHub(GitHubError),
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::InvalidRepoUrl(_) => FailureKind::InvalidInput,
            AnalysisError::RepositoryNotFound(_) => FailureKind::NotFound,
            AnalysisError::RateLimited { .. } => FailureKind::RateLimited,
            AnalysisError::Timeout(_) => FailureKind::Timeout,
            AnalysisError::GitHub(e) => e.kind(),
        }
    }
}

impl From<GitHubError> for AnalysisError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::InvalidRepoUrl(url) => AnalysisError::InvalidRepoUrl(url),
            GitHubError::NotFound(what) => AnalysisError::RepositoryNotFound(what),
            GitHubError::RateLimited { reset_at } => AnalysisError::RateLimited { reset_at },
            other => AnalysisError::GitHub(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cached payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not prepare cache location: {0}")]
    Io(#[from] std::io::Error),
}
