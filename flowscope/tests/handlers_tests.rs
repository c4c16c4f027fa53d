// Tests for CLI handler helpers

use flowscope::command_argument_builder;
use flowscope::handlers::*;
use flowscope_core::analyzer::RouteAnalyzer;
use flowscope_core::crawl::CrawlOptions;
use flowscope_core::data::{CacheEntry, ProjectKind, ResultCache};
use flowscope_core::error::AnalysisError;
use flowscope_scanner::error::{CrawlError, GitHubError};
use flowscope_scanner::github::GitHubClient;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn crawl_matches(extra: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["flowscope", "crawl", "-u", "https://example.com/start"];
    argv.extend_from_slice(extra);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    matches.subcommand_matches("crawl").unwrap().clone()
}

fn quick_options(url: &str) -> CrawlOptions {
    let mut options = CrawlOptions::new(url);
    options.delay = Duration::ZERO;
    options.timeout = Duration::from_secs(5);
    options
}

// ============================================================================
// Argument Tests
// ============================================================================

#[test]
fn test_crawl_options_from_args_clamps_limits() {
    let args = crawl_matches(&["--max-pages", "500", "--max-depth", "0", "--no-robots"]);
    let options = crawl_options_from_args(&args).unwrap();

    assert_eq!(options.url, "https://example.com/start");
    assert_eq!(options.max_pages, 30);
    assert_eq!(options.max_depth, 1);
    assert!(!options.respect_robots);
}

#[test]
fn test_crawl_options_from_args_timing() {
    let args = crawl_matches(&["--delay", "250", "--timeout", "4000", "--user-agent", "probe/1.0"]);
    let options = crawl_options_from_args(&args).unwrap();

    assert_eq!(options.delay, Duration::from_millis(250));
    assert_eq!(options.timeout, Duration::from_millis(4000));
    assert_eq!(options.user_agent.as_deref(), Some("probe/1.0"));
}

#[test]
fn test_resolve_cache_path_expands_tilde() {
    let resolved = resolve_cache_path("~/.config/flowscope/cache.db");
    assert!(!resolved.to_string_lossy().starts_with('~'));
    assert!(resolved.ends_with(".config/flowscope/cache.db"));

    let plain = resolve_cache_path("/tmp/cache.db");
    assert_eq!(plain.to_str(), Some("/tmp/cache.db"));
}

#[test]
fn test_open_cache_respects_no_cache() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cache.db");
    let db_arg = db_path.to_str().unwrap();

    let args = crawl_matches(&["--cache", db_arg, "--no-cache"]);
    assert!(open_cache(&args).is_none());
    assert!(!db_path.exists());

    let args = crawl_matches(&["--cache", db_arg]);
    assert!(open_cache(&args).is_some());
    assert!(db_path.exists());
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_exit_codes_follow_failure_kind() {
    let invalid = anyhow::Error::new(CrawlError::InvalidUrl("nope".to_string()));
    assert_eq!(exit_code(&invalid), 2);

    let missing = anyhow::Error::new(AnalysisError::RepositoryNotFound("a/b".to_string()))
        .context("Analysis of https://github.com/a/b failed");
    assert_eq!(exit_code(&missing), 3);

    let limited = anyhow::Error::new(GitHubError::RateLimited { reset_at: 0 });
    assert_eq!(exit_code(&limited), 4);

    let slow = anyhow::Error::new(CrawlError::Timeout("https://example.com".to_string()));
    assert_eq!(exit_code(&slow), 5);

    assert_eq!(exit_code(&anyhow::anyhow!("disk full")), 1);
}

#[test]
fn test_format_entry() {
    let line = format_entry(&CacheEntry {
        kind: ProjectKind::Repository,
        key: "https://github.com/acme/site".to_string(),
        created_at: 1_700_000_000,
    });
    assert!(line.starts_with("repository"));
    assert!(line.ends_with("https://github.com/acme/site"));
    assert!(line.contains("2023-11-1"));
}

// ============================================================================
// Cached Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_crawl_with_cache_miss_then_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><head><title>Home</title></head><body></body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let cache = ResultCache::in_memory().unwrap();

    let first = crawl_with_cache(quick_options(&server.uri()), Some(&cache))
        .await
        .unwrap();
    assert!(!first.cached);
    assert_eq!(first.result.pages.len(), 1);
    assert!(cache.get_website(&server.uri()).unwrap().is_some());

    let requests_after_first = server.received_requests().await.unwrap().len();

    let second = crawl_with_cache(quick_options(&format!("{}/elsewhere", server.uri())), Some(&cache))
        .await
        .unwrap();
    assert!(second.cached);
    assert_eq!(second.result, first.result);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_first
    );
}

#[tokio::test]
async fn test_crawl_without_cache_always_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>hi</body></html>", "text/html"),
        )
        .expect(2)
        .mount(&server)
        .await;

    for _ in 0..2 {
        let fetched = crawl_with_cache(quick_options(&server.uri()), None)
            .await
            .unwrap();
        assert!(!fetched.cached);
    }
}

#[tokio::test]
async fn test_crawl_failure_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cache = ResultCache::in_memory().unwrap();
    let err = crawl_with_cache(quick_options(&server.uri()), Some(&cache))
        .await
        .unwrap_err();

    assert_eq!(exit_code(&err), 3);
    assert!(cache.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_analyze_with_cache_uses_canonical_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rate": { "limit": 5000, "remaining": 4999, "reset": 4102444800u64, "used": 1 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/Acme/Site"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Site",
            "full_name": "Acme/Site",
            "description": null,
            "language": "TypeScript",
            "default_branch": "main",
            "private": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "name": "page.tsx", "path": "app/page.tsx", "sha": "1" }
            ]
        })))
        .mount(&server)
        .await;

    let client = GitHubClient::builder()
        .api_base(server.uri())
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let analyzer = RouteAnalyzer::new(client);
    let cache = ResultCache::in_memory().unwrap();

    let first = analyze_with_cache(&analyzer, "https://github.com/Acme/Site.git", Some(&cache))
        .await
        .unwrap();
    assert!(!first.cached);
    assert_eq!(first.result.routes.len(), 1);
    assert!(
        cache
            .get_repository("https://github.com/acme/site")
            .unwrap()
            .is_some()
    );

    let second = analyze_with_cache(&analyzer, "github.com/Acme/Site", Some(&cache))
        .await
        .unwrap();
    assert!(second.cached);
    assert_eq!(second.result, first.result);
}

#[tokio::test]
async fn test_analyze_with_cache_rejects_invalid_url() {
    let server = MockServer::start().await;
    let client = GitHubClient::builder()
        .api_base(server.uri())
        .build()
        .unwrap();
    let analyzer = RouteAnalyzer::new(client);

    let err = analyze_with_cache(&analyzer, "https://gitlab.com/acme/site", None)
        .await
        .unwrap_err();

    assert_eq!(exit_code(&err), 2);
    assert!(server.received_requests().await.unwrap().is_empty());
}
