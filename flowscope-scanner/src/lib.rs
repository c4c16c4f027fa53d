pub mod crawler;
pub mod error;
pub mod github;
pub mod rate_limit;
pub mod result;

pub use crawler::{Crawler, CrawlerOptions, crawl_website};
pub use error::{CrawlError, FailureKind, GitHubError};
pub use github::{GitHubClient, RepoFile, RepoInfo, RepoRef};
pub use rate_limit::{RateLimitGate, RateLimitState};
pub use result::{Connection, ConnectionKind, CrawlMetadata, CrawlResult, Page};
