use flowscope_scanner::crawler::{Crawler, CrawlerOptions, ProgressCallback, normalize_base_url};
use flowscope_scanner::error::CrawlError;
use flowscope_scanner::result::CrawlResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

pub const MAX_PAGES_LIMIT: usize = 30;
pub const MAX_DEPTH_LIMIT: usize = 5;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(180);

/// Options for a single website crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    pub max_pages: usize,
    pub max_depth: usize,
    pub delay: Duration,
    pub timeout: Duration,
    pub respect_robots: bool,
    pub user_agent: Option<String>,
    /// Overall budget; expiry surfaces as `CrawlError::Timeout`.
    pub deadline: Option<Duration>,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>) -> Self {
        let defaults = CrawlerOptions::default();
        Self {
            url: url.into(),
            max_pages: defaults.max_pages,
            max_depth: defaults.max_depth,
            delay: defaults.delay,
            timeout: defaults.timeout,
            respect_robots: defaults.respect_robots,
            user_agent: None,
            deadline: Some(DEFAULT_DEADLINE),
            show_progress_bars: false,
        }
    }

    /// Forces page and depth limits into `1..=30` and `1..=5`.
    pub fn clamped(mut self) -> Self {
        self.max_pages = self.max_pages.clamp(1, MAX_PAGES_LIMIT);
        self.max_depth = self.max_depth.clamp(1, MAX_DEPTH_LIMIT);
        self
    }

    pub fn crawler_options(&self) -> CrawlerOptions {
        let mut options = CrawlerOptions {
            max_pages: self.max_pages,
            max_depth: self.max_depth,
            respect_robots: self.respect_robots,
            delay: self.delay,
            timeout: self.timeout,
            ..CrawlerOptions::default()
        };
        if let Some(ref ua) = self.user_agent {
            options.user_agent = ua.clone();
        }
        options
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Cache key for a website: scheme, host and port of the seed.
pub fn normalize_seed(url: &str) -> Result<String, CrawlError> {
    Ok(normalize_base_url(url)?.origin().ascii_serialization())
}

/// Execute a crawl with the given options
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlResult, CrawlError> {
    let seed = normalize_seed(&options.url)?;

    let progress_bar = if options.show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("Crawling {}...", seed));
        Some(pb)
    } else {
        None
    };

    let processed = Arc::new(AtomicUsize::new(0));
    let internal_callback: ProgressCallback = {
        let pb = progress_bar.clone();
        let processed = processed.clone();
        let external = progress_callback.clone();
        Arc::new(move |collected: usize, url: String| {
            processed.fetch_add(1, Ordering::Relaxed);
            if let Some(ref pb) = pb {
                pb.set_message(format!("Crawling... {} pages collected, fetching {}", collected, url));
            }
            if let Some(ref callback) = external {
                callback(url);
            }
        })
    };

    let crawler = Crawler::new(options.crawler_options())?.with_progress_callback(internal_callback);

    let outcome = match options.deadline {
        Some(deadline) => tokio::time::timeout(deadline, crawler.crawl(&seed))
            .await
            .unwrap_or_else(|_| Err(CrawlError::Timeout(seed.clone()))),
        None => crawler.crawl(&seed).await,
    };

    if let Some(ref pb) = progress_bar {
        match outcome {
            Ok(ref result) => pb.finish_with_message(format!(
                "Crawl complete! {} pages, {} connections",
                result.pages.len(),
                result.connections.len()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    if outcome.is_ok() {
        info!(
            "Crawl of {} finished after {} fetches",
            seed,
            processed.load(Ordering::Relaxed)
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        let mut options = CrawlOptions::new("https://example.com");
        options.max_pages = 500;
        options.max_depth = 0;
        let options = options.clamped();
        assert_eq!(options.max_pages, 30);
        assert_eq!(options.max_depth, 1);
    }

    #[test]
    fn test_defaults_match_crawler() {
        let options = CrawlOptions::new("https://example.com");
        assert_eq!(options.max_pages, 30);
        assert_eq!(options.max_depth, 3);
        assert_eq!(options.delay, Duration::from_millis(1000));
        assert_eq!(options.timeout, Duration::from_millis(10_000));
        assert!(options.respect_robots);
    }

    #[test]
    fn test_crawler_options_user_agent_override() {
        let mut options = CrawlOptions::new("https://example.com");
        options.user_agent = Some("custom/1.0".to_string());
        assert_eq!(options.crawler_options().user_agent, "custom/1.0");
    }

    #[test]
    fn test_normalize_seed() {
        assert_eq!(
            normalize_seed("https://Example.com/some/page?q=1").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            normalize_seed("http://localhost:3000/").unwrap(),
            "http://localhost:3000"
        );
        assert!(normalize_seed("ftp://example.com").is_err());
    }
}
