//! GitHub REST client used for repository route discovery.
//!
//! Every call passes through the client's [`RateLimitGate`]. A call rejected
//! for rate limiting is retried exactly once after refreshing the quota.

use crate::error::GitHubError;
use crate::rate_limit::{Clock, RateLimitGate, RateLimitState, SystemClock};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

type Result<T> = std::result::Result<T, GitHubError>;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_BRANCH: &str = "main";
const FALLBACK_BRANCH: &str = "master";

/// Directories that conventionally hold routing code, probed in order.
pub const PROBE_DIRECTORIES: &[&str] = &[
    "app",
    "pages",
    "src/app",
    "src/pages",
    "src/components",
    "components",
    "src",
    "routes",
    "router",
];

/// Levels below a probed directory that are listed.
const PROBE_DEPTH: usize = 3;

const SEARCH_PER_PAGE: &str = "50";

const RELEVANT_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".vue", ".svelte"];
const RELEVANT_FILES: &[&str] = &[
    "package.json",
    "next.config.js",
    "next.config.ts",
    "next.config.mjs",
    "app.js",
    "app.ts",
];

/// Owner, repository and branch parsed from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Canonical URL used as the cache key of an analysis.
    pub fn canonical_url(&self) -> String {
        format!(
            "https://github.com/{}/{}",
            self.owner.to_lowercase(),
            self.repo.to_lowercase()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub default_branch: String,
    #[serde(rename = "private")]
    pub is_private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Dir,
}

/// A file or directory entry discovered in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl RepoFile {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sha: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(ContentItem),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
    path: String,
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateLimitState,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Parses `https://github.com/<owner>/<repo>[.git][/...]`.
///
/// The scheme and `www.` prefix are optional.
pub fn parse_repo_url(url: &str) -> Result<RepoRef> {
    let trimmed = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");

    let Some(path) = trimmed.strip_prefix("github.com/") else {
        return Err(GitHubError::InvalidRepoUrl(url.to_string()));
    };

    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    let (Some(owner), Some(repo)) = (parts.next(), parts.next()) else {
        return Err(GitHubError::InvalidRepoUrl(url.to_string()));
    };

    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    let valid = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if !valid(owner) || !valid(repo) {
        return Err(GitHubError::InvalidRepoUrl(url.to_string()));
    }

    Ok(RepoRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        branch: DEFAULT_BRANCH.to_string(),
    })
}

/// Source files and framework config files worth listing.
pub fn is_relevant_file(name: &str) -> bool {
    RELEVANT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) || RELEVANT_FILES.contains(&name)
}

fn dedupe_by_path(files: Vec<RepoFile>) -> Vec<RepoFile> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.path.clone()))
        .collect()
}

pub struct GitHubClientBuilder {
    token: Option<String>,
    api_base: String,
    user_agent: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    gate: Option<Arc<RateLimitGate>>,
}

impl GitHubClientBuilder {
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shares an existing gate instead of creating a fresh one.
    pub fn rate_limit_gate(mut self, gate: Arc<RateLimitGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> Result<GitHubClient> {
        let client = Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .build()?;

        let api_base = Url::parse(&self.api_base)
            .map_err(|e| GitHubError::InvalidRepoUrl(format!("{}: {}", self.api_base, e)))?;

        let gate = self
            .gate
            .unwrap_or_else(|| Arc::new(RateLimitGate::new(self.clock)));

        Ok(GitHubClient {
            client,
            api_base,
            token: self.token,
            gate,
        })
    }
}

pub struct GitHubClient {
    client: Client,
    api_base: Url,
    token: Option<String>,
    gate: Arc<RateLimitGate>,
}

impl GitHubClient {
    pub fn builder() -> GitHubClientBuilder {
        GitHubClientBuilder {
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: concat!("flowscope/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            clock: Arc::new(SystemClock),
            gate: None,
        }
    }

    pub fn new(token: Option<String>) -> Result<Self> {
        Self::builder().token(token).build()
    }

    pub fn rate_limit_gate(&self) -> Arc<RateLimitGate> {
        self.gate.clone()
    }

    pub fn parse_repo_url(&self, url: &str) -> Result<RepoRef> {
        parse_repo_url(url)
    }

    /// Fetches the quota from `/rate_limit` and caches it in the gate.
    pub async fn check_rate_limit(&self) -> Result<RateLimitState> {
        let url = self.endpoint(&["rate_limit"], &[])?;
        let response: RateLimitResponse = self.send_json(&url).await?;
        self.gate.record(response.rate).await;
        Ok(response.rate)
    }

    /// `false` when the repository does not exist or is not visible to us.
    pub async fn validate_repo(&self, owner: &str, repo: &str) -> Result<bool> {
        match self.get_repo_info(owner, repo).await {
            Ok(_) => Ok(true),
            Err(GitHubError::NotFound(_))
            | Err(GitHubError::Unauthorized(_))
            | Err(GitHubError::Api { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get_repo_info(&self, owner: &str, repo: &str) -> Result<RepoInfo> {
        let url = self.endpoint(&["repos", owner, repo], &[])?;
        self.get_json(url).await
    }

    /// Lists route-relevant files, preferring code search over directory probes.
    pub async fn get_repo_contents(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<RepoFile>> {
        info!("Using GitHub code search for {}/{}", owner, repo);
        let found = self.search_route_files(owner, repo).await?;
        if !found.is_empty() {
            info!("Found {} potential route files via search", found.len());
            return Ok(found);
        }

        info!("Search found nothing, probing conventional directories");
        self.get_repo_contents_by_probe(owner, repo, branch).await
    }

    /// Runs the route-oriented code searches and merges their results.
    ///
    /// A failing query is logged and skipped. Once search is rate limited the
    /// remaining queries are dropped and whatever was found so far is returned.
    pub async fn search_route_files(&self, owner: &str, repo: &str) -> Result<Vec<RepoFile>> {
        let scope = format!("repo:{}/{}", owner, repo);
        let exts = "extension:tsx OR extension:ts OR extension:jsx OR extension:js";
        let queries = [
            format!(
                "{} filename:page.tsx OR filename:page.ts OR filename:page.jsx OR filename:page.js",
                scope
            ),
            format!("{} path:pages/ {}", scope, exts),
            format!("{} path:app/ {}", scope, exts),
            format!(
                "{} filename:route.tsx OR filename:route.ts OR filename:route.jsx OR filename:route.js",
                scope
            ),
            format!("{} \"Route\" OR \"Router\" {}", scope, exts),
        ];

        let mut files = Vec::new();
        for query in &queries {
            let url = self.endpoint(&["search", "code"], &[("q", query), ("per_page", SEARCH_PER_PAGE)])?;
            match self.get_json::<SearchResponse>(url).await {
                Ok(response) => {
                    debug!("Search '{}' returned {} items", query, response.items.len());
                    files.extend(response.items.into_iter().map(|item| RepoFile {
                        name: item.name,
                        path: item.path,
                        kind: FileKind::File,
                        sha: item.sha,
                        content: None,
                    }));
                }
                Err(e @ GitHubError::RateLimited { .. }) => {
                    warn!("Code search rate limited, skipping remaining queries: {}", e);
                    break;
                }
                Err(e) => warn!("Search query failed: {}: {}", query, e),
            }
        }

        Ok(dedupe_by_path(files))
    }

    /// Lists the conventional routing directories plus the repository root.
    pub async fn get_repo_contents_by_probe(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<RepoFile>> {
        let mut files = Vec::new();

        for dir in PROBE_DIRECTORIES {
            match self
                .list_directory(owner, repo, branch, (*dir).to_string(), 0, PROBE_DEPTH)
                .await
            {
                Ok(found) => files.extend(found),
                Err(e @ GitHubError::RateLimited { .. }) => return Err(e),
                Err(e) if e.is_not_found() => debug!("Path {} not found, skipping", dir),
                Err(e) => warn!("Could not list {}: {}", dir, e),
            }
        }

        match self
            .list_directory(owner, repo, branch, String::new(), 0, 0)
            .await
        {
            Ok(root) => files.extend(root.into_iter().filter(RepoFile::is_file)),
            Err(e @ GitHubError::RateLimited { .. }) => return Err(e),
            Err(e) => warn!("Could not fetch root files: {}", e),
        }

        Ok(dedupe_by_path(files))
    }

    fn list_directory<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        branch: &'a str,
        path: String,
        depth: usize,
        max_depth: usize,
    ) -> BoxFuture<'a, Result<Vec<RepoFile>>> {
        async move {
            let items = match self.get_contents(owner, repo, &path, branch).await? {
                ContentsResponse::Listing(items) => items,
                ContentsResponse::Single(item) => vec![item],
            };

            let mut files = Vec::new();
            for item in items {
                match item.kind.as_str() {
                    "file" if is_relevant_file(&item.name) => files.push(RepoFile {
                        name: item.name,
                        path: item.path,
                        kind: FileKind::File,
                        sha: item.sha,
                        content: None,
                    }),
                    "dir" => {
                        let sub_path = item.path.clone();
                        files.push(RepoFile {
                            name: item.name,
                            path: item.path,
                            kind: FileKind::Dir,
                            sha: item.sha,
                            content: None,
                        });

                        if depth < max_depth {
                            match self
                                .list_directory(owner, repo, branch, sub_path.clone(), depth + 1, max_depth)
                                .await
                            {
                                Ok(sub) => files.extend(sub),
                                Err(e) if e.is_not_found() => {
                                    debug!("Path {} vanished while listing", sub_path)
                                }
                                Err(e) => return Err(e),
                            }
                        }
                    }
                    _ => {}
                }
            }

            Ok(files)
        }
        .boxed()
    }

    /// Decoded text of a file; a 404 on `main` is retried once on `master`.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<String> {
        match self.fetch_file(owner, repo, path, branch).await {
            Err(e) if e.is_not_found() && branch == DEFAULT_BRANCH => {
                debug!("{} not found on {}, trying {}", path, DEFAULT_BRANCH, FALLBACK_BRANCH);
                self.fetch_file(owner, repo, path, FALLBACK_BRANCH).await
            }
            other => other,
        }
    }

    async fn fetch_file(&self, owner: &str, repo: &str, path: &str, branch: &str) -> Result<String> {
        let item = match self.get_contents(owner, repo, path, branch).await? {
            ContentsResponse::Single(item) if item.kind == "file" => item,
            _ => return Err(GitHubError::NotAFile(path.to_string())),
        };

        let encoded: String = item
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        let bytes = STANDARD.decode(encoded).map_err(|e| GitHubError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<ContentsResponse> {
        let mut segments = vec!["repos", owner, repo, "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let url = self.endpoint(&segments, &[("ref", branch)])?;
        self.get_json(url).await
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| GitHubError::InvalidRepoUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Gated GET with a single retry when GitHub reports rate limiting.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.gate.pass(false, || self.fetch_rate_limit()).await;

        match self.send_json(&url).await {
            Err(GitHubError::RateLimited { .. }) => {
                warn!("Rate limit hit, checking status and retrying {}", url.path());
                self.gate.pass(true, || self.fetch_rate_limit()).await;
                self.send_json(&url).await
            }
            other => other,
        }
    }

    /// Runs while the gate is locked, so it must not record into the gate.
    async fn fetch_rate_limit(&self) -> Option<RateLimitState> {
        let url = self.endpoint(&["rate_limit"], &[]).ok()?;
        match self.send_unrecorded::<RateLimitResponse>(&url).await.0 {
            Ok(response) => Some(response.rate),
            Err(e) => {
                warn!("Failed to check rate limit: {}", e);
                None
            }
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let (result, core_state) = self.send_unrecorded(url).await;
        if let Some(state) = core_state {
            self.gate.record(state).await;
        }
        result
    }

    /// The returned state is the core quota from the response headers, if any.
    async fn send_unrecorded<T: DeserializeOwned>(
        &self,
        url: &Url,
    ) -> (Result<T>, Option<RateLimitState>) {
        let mut request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return (Err(e.into()), None),
        };
        let headers_state = RateLimitState::from_headers(response.headers());
        let core_state = RateLimitState::core_from_headers(response.headers());

        let status = response.status();
        if status.is_success() {
            let body = response.json::<T>().await.map_err(GitHubError::from);
            return (body, core_state);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();

        (
            Err(classify_status(status, message, url, headers_state)),
            core_state,
        )
    }
}

fn classify_status(
    status: StatusCode,
    message: String,
    url: &Url,
    rate: Option<RateLimitState>,
) -> GitHubError {
    let exhausted = rate.is_some_and(|r| r.remaining == 0);
    let mentions_limit = message.to_lowercase().contains("rate limit");

    match status {
        StatusCode::NOT_FOUND => GitHubError::NotFound(url.path().to_string()),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS if exhausted || mentions_limit => {
            GitHubError::RateLimited {
                reset_at: rate.map(|r| r.reset).unwrap_or_default(),
            }
        }
        StatusCode::UNAUTHORIZED => GitHubError::Unauthorized(message),
        _ => GitHubError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
