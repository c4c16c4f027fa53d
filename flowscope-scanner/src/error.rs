use thiserror::Error;

/// Coarse classification of a pipeline failure, for callers that map errors
/// to user-facing messages or status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    NotFound,
    RateLimited,
    Timeout,
    Other,
}

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Website not reachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timed out fetching {0}")]
    Timeout(String),

    #[error("Seed page {url} returned HTTP {status}")]
    SeedStatus { url: String, status: u16 },

    #[error("Seed page {url} is not HTML (content-type: {content_type})")]
    SeedNotHtml { url: String, content_type: String },

    #[error("Seed page {0} is disallowed by robots.txt")]
    SeedDisallowed(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl CrawlError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CrawlError::InvalidUrl(_) => FailureKind::InvalidInput,
            CrawlError::Unreachable { .. } => FailureKind::NotFound,
            CrawlError::SeedStatus { status, .. } if *status == 404 || *status == 410 => {
                FailureKind::NotFound
            }
            CrawlError::SeedStatus { status, .. } if *status == 429 => FailureKind::RateLimited,
            CrawlError::Timeout(_) => FailureKind::Timeout,
            CrawlError::Http(e) if e.is_timeout() => FailureKind::Timeout,
            _ => FailureKind::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("Invalid GitHub URL: {0}")]
    InvalidRepoUrl(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("GitHub API rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: u64 },

    #[error("GitHub rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Path is not a file: {0}")]
    NotAFile(String),

    #[error("Failed to decode content of {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl GitHubError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GitHubError::InvalidRepoUrl(_) => FailureKind::InvalidInput,
            GitHubError::NotFound(_) => FailureKind::NotFound,
            GitHubError::RateLimited { .. } => FailureKind::RateLimited,
            GitHubError::Http(e) if e.is_timeout() => FailureKind::Timeout,
            _ => FailureKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
