use crate::error::{CrawlError, Result};
use crate::result::{Connection, ConnectionKind, CrawlMetadata, CrawlResult, Page};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use texting_robots::Robot;
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form[action]").expect("valid form selector"));

pub const DEFAULT_USER_AGENT: &str =
    concat!("flowscope website analyzer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub max_pages: usize,
    pub max_depth: usize,
    pub respect_robots: bool,
    /// Politeness delay before every fetch but the first.
    pub delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// How many internal links of each page are followed.
    pub links_per_page: usize,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_pages: 30,
            max_depth: 3,
            respect_robots: true,
            delay: Duration::from_millis(1000),
            timeout: Duration::from_millis(10_000),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            links_per_page: 5,
        }
    }
}

/// What came back for one page fetch that reached the server.
enum FetchOutcome {
    Html(String),
    Status(u16),
    NotHtml(String),
}

pub struct Crawler {
    client: Client,
    options: CrawlerOptions,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(options: CrawlerOptions) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(options.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            options,
            progress_callback: None,
        })
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.options.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.options.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn with_respect_robots(mut self, respect_robots: bool) -> Self {
        self.options.respect_robots = respect_robots;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.user_agent = user_agent.into();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn options(&self) -> &CrawlerOptions {
        &self.options
    }

    /// Crawls the site hosting `seed`, starting from its root.
    ///
    /// Only a failure to parse the seed or to fetch the root page is an error;
    /// every other page that fails is logged and left out of the result.
    pub async fn crawl(&self, seed: &str) -> Result<CrawlResult> {
        let start = Instant::now();
        let base = normalize_base_url(seed)?;
        let base_str = base.to_string();

        info!(
            "Starting crawl of {} (max_pages={}, max_depth={})",
            base_str, self.options.max_pages, self.options.max_depth
        );

        let robots = if self.options.respect_robots {
            self.load_robots(&base).await
        } else {
            None
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut used_ids: HashSet<String> = HashSet::new();
        let mut pages: Vec<Page> = Vec::new();
        let mut worklist: VecDeque<(String, usize)> = VecDeque::new();
        worklist.push_back((base_str.clone(), 0));
        let mut fetched_any = false;

        while let Some((url, depth)) = worklist.pop_front() {
            if pages.len() >= self.options.max_pages {
                debug!("Page limit reached, stopping");
                break;
            }
            if depth > self.options.max_depth {
                continue;
            }
            if !visited.insert(url.clone()) {
                continue;
            }

            let is_entry_point = url == base_str;

            if let Some(ref robot) = robots
                && !robot.allowed(&url)
            {
                if is_entry_point {
                    return Err(CrawlError::SeedDisallowed(url));
                }
                debug!("Disallowed by robots.txt: {}", url);
                continue;
            }

            if fetched_any && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }
            fetched_any = true;

            if let Some(ref callback) = self.progress_callback {
                callback(pages.len(), url.clone());
            }

            let html = match self.fetch_page(&url).await {
                Ok(FetchOutcome::Html(body)) => body,
                Ok(FetchOutcome::Status(status)) => {
                    if is_entry_point {
                        return Err(CrawlError::SeedStatus { url, status });
                    }
                    warn!("Failed to fetch {}: HTTP {}", url, status);
                    continue;
                }
                Ok(FetchOutcome::NotHtml(content_type)) => {
                    if is_entry_point {
                        return Err(CrawlError::SeedNotHtml { url, content_type });
                    }
                    warn!("Skipping non-HTML content: {} ({})", url, content_type);
                    continue;
                }
                Err(e) => {
                    if is_entry_point {
                        return Err(classify_fetch_error(url, e));
                    }
                    warn!("Crawl error for {}: {}", url, e);
                    continue;
                }
            };

            let path = extract_url_path(&url);
            let (title, links) = parse_page(&html, &url);
            let title = title.unwrap_or_else(|| path.clone());
            let id = assign_page_id(&path, &mut used_ids);

            let follow: Vec<String> = links
                .iter()
                .filter(|link| is_internal_link(link, &base))
                .take(self.options.links_per_page)
                .cloned()
                .collect();

            debug!("Collected {} ({} links, depth {})", url, links.len(), depth);
            pages.push(Page {
                id,
                url,
                title,
                path,
                links,
                is_entry_point,
                depth,
            });

            for link in follow {
                if pages.len() < self.options.max_pages {
                    worklist.push_back((link, depth + 1));
                }
            }
        }

        let connections = derive_connections(&pages);
        let max_depth = pages.iter().map(|p| p.depth).max().unwrap_or(0);
        let metadata = CrawlMetadata {
            base_url: base.origin().ascii_serialization(),
            total_pages: pages.len(),
            max_depth,
            crawl_time: start.elapsed().as_millis() as u64,
        };

        info!(
            "Crawl complete. Collected {} pages, {} connections",
            pages.len(),
            connections.len()
        );

        Ok(CrawlResult {
            pages,
            connections,
            metadata,
        })
    }

    async fn fetch_page(&self, url: &str) -> std::result::Result<FetchOutcome, reqwest::Error> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.options.user_agent)
            .timeout(self.options.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Ok(FetchOutcome::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("text/html") {
            return Ok(FetchOutcome::NotHtml(content_type));
        }

        Ok(FetchOutcome::Html(response.text().await?))
    }

    /// Missing or unreadable robots.txt means everything is allowed.
    async fn load_robots(&self, base: &Url) -> Option<Robot> {
        let robots_url = base.join("/robots.txt").ok()?;
        let response = self
            .client
            .get(robots_url.as_str())
            .header(reqwest::header::USER_AGENT, &self.options.user_agent)
            .timeout(self.options.timeout)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            debug!("No robots.txt at {} ({})", robots_url, response.status());
            return None;
        }

        let body = response.bytes().await.ok()?;
        match Robot::new(&self.options.user_agent, &body) {
            Ok(robot) => Some(robot),
            Err(e) => {
                warn!("Ignoring unparsable robots.txt at {}: {}", robots_url, e);
                None
            }
        }
    }
}

/// Crawls `seed` with the given options.
pub async fn crawl_website(seed: &str, options: CrawlerOptions) -> Result<CrawlResult> {
    Crawler::new(options)?.crawl(seed).await
}

fn classify_fetch_error(url: String, e: reqwest::Error) -> CrawlError {
    if e.is_timeout() {
        CrawlError::Timeout(url)
    } else {
        CrawlError::Unreachable { url, source: e }
    }
}

/// Reduces a seed URL to the root of its site: scheme, host and port.
pub fn normalize_base_url(seed: &str) -> Result<Url> {
    let parsed =
        Url::parse(seed).map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", seed, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(CrawlError::InvalidUrl(format!(
            "{}: expected an http(s) URL with a host",
            seed
        )));
    }

    Url::parse(&parsed.origin().ascii_serialization())
        .map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", seed, e)))
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() { "/".to_string() } else { path }
        })
        .unwrap_or_else(|| "/".to_string())
}

/// Same host and effective port as the crawl base.
pub fn is_internal_link(url: &str, base: &Url) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.host_str().is_some()
                && parsed.host_str() == base.host_str()
                && parsed.port_or_known_default() == base.port_or_known_default()
        }
        Err(_) => false,
    }
}

/// Slug of a URL path, `home` for the root.
pub fn page_slug(path: &str) -> String {
    let replaced: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "home".to_string()
    } else {
        trimmed.to_string()
    }
}

fn assign_page_id(path: &str, used: &mut HashSet<String>) -> String {
    let slug = page_slug(path);
    let mut id = slug.clone();
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{}_{}", slug, n);
        n += 1;
    }
    used.insert(id.clone());
    id
}

fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Title text and outbound links (anchors first, then form actions).
pub fn parse_page(html: &str, page_url: &str) -> (Option<String>, Vec<String>) {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let Ok(base) = Url::parse(page_url) else {
        return (title, Vec::new());
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let hrefs = document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|el| el.value().attr("href"));
    let actions = document
        .select(&FORM_SELECTOR)
        .filter_map(|el| el.value().attr("action"));

    for raw in hrefs.chain(actions) {
        if let Some(absolute) = resolve_url(&base, raw)
            && seen.insert(absolute.clone())
        {
            links.push(absolute);
        }
    }

    (title, links)
}

/// Edges for every link that lands on another collected page.
pub fn derive_connections(pages: &[Page]) -> Vec<Connection> {
    let by_url: HashMap<&str, &str> = pages
        .iter()
        .map(|p| (p.url.as_str(), p.id.as_str()))
        .collect();

    let mut connections = Vec::new();
    for page in pages {
        for link in &page.links {
            if let Some(target) = by_url.get(link.as_str()) {
                connections.push(Connection {
                    source: page.id.clone(),
                    target: (*target).to_string(),
                    kind: ConnectionKind::Navigation,
                });
            }
        }
    }
    connections
}
