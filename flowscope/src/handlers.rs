use anyhow::{Context, Result, anyhow};
use chrono::{Local, TimeZone};
use clap::ArgMatches;
use colored::Colorize;
use flowscope_core::analyzer::RouteAnalyzer;
use flowscope_core::crawl::{CrawlOptions, execute_crawl, normalize_seed};
use flowscope_core::data::{CacheEntry, ResultCache};
use flowscope_core::error::AnalysisError;
use flowscope_core::model::AnalysisResult;
use flowscope_core::report::{
    ReportFormat, generate_analysis_report, generate_crawl_report, save_report,
};
use flowscope_scanner::error::{CrawlError, FailureKind, GitHubError};
use flowscope_scanner::github::{GitHubClient, parse_repo_url};
use flowscope_scanner::result::CrawlResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// A pipeline result and whether it came out of the cache.
#[derive(Debug)]
pub struct Fetched<T> {
    pub result: T,
    pub cached: bool,
}

pub fn print_banner() {
    println!(
        "{} {}",
        "flowscope".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
}

/// Expands a leading `~` in the cache path.
pub fn resolve_cache_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Opens the cache named by `--cache`, or `None` under `--no-cache`.
///
/// A cache that cannot be opened is reported and skipped rather than failing
/// the whole command.
pub fn open_cache(args: &ArgMatches) -> Option<ResultCache> {
    if args.get_flag("no-cache") {
        return None;
    }
    let raw = args.get_one::<String>("cache")?;
    let path = resolve_cache_path(raw);
    match ResultCache::new(&path) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("Result cache at {} unavailable: {}", path.display(), e);
            None
        }
    }
}

/// Process exit status for a failed command, based on the first pipeline
/// error found in the chain.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let kind = err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<CrawlError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<AnalysisError>() {
            Some(e.kind())
        } else {
            cause.downcast_ref::<GitHubError>().map(GitHubError::kind)
        }
    });

    match kind {
        Some(FailureKind::InvalidInput) => 2,
        Some(FailureKind::NotFound) => 3,
        Some(FailureKind::RateLimited) => 4,
        Some(FailureKind::Timeout) => 5,
        Some(FailureKind::Other) | None => 1,
    }
}

pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "✗".red().bold(), err.to_string().red());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".bright_black(), cause);
    }
}

fn report_format(args: &ArgMatches) -> Result<ReportFormat> {
    args.get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text")
        .parse::<ReportFormat>()
        .map_err(|e| anyhow!(e))
}

/// Writes the report to `output` when given, otherwise to stdout.
pub fn emit_report(report: &str, output: Option<&PathBuf>, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            save_report(report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                println!(
                    "{} Report saved to: {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => print!("{}", report),
    }
    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message);
    pb
}

// ============================================================================
// Crawl
// ============================================================================

/// Builds clamped crawl options from the `crawl` subcommand arguments.
pub fn crawl_options_from_args(args: &ArgMatches) -> Result<CrawlOptions> {
    let url = args
        .get_one::<String>("url")
        .context("--url is required")?;

    let mut options = CrawlOptions::new(url.as_str());
    if let Some(&max_pages) = args.get_one::<usize>("max-pages") {
        options.max_pages = max_pages;
    }
    if let Some(&max_depth) = args.get_one::<usize>("max-depth") {
        options.max_depth = max_depth;
    }
    if let Some(&delay) = args.get_one::<u64>("delay") {
        options.delay = Duration::from_millis(delay);
    }
    if let Some(&timeout) = args.get_one::<u64>("timeout") {
        options.timeout = Duration::from_millis(timeout);
    }
    options.respect_robots = !args.get_flag("no-robots");
    options.user_agent = args.get_one::<String>("user-agent").cloned();

    Ok(options.clamped())
}

/// Looks the seed up in the cache, crawling and storing it on a miss.
pub async fn crawl_with_cache(
    options: CrawlOptions,
    cache: Option<&ResultCache>,
) -> Result<Fetched<CrawlResult>> {
    let key = normalize_seed(&options.url)?;

    if let Some(cache) = cache {
        match cache.get_website(&key) {
            Ok(Some(result)) => {
                debug!("Cache hit for {}", key);
                return Ok(Fetched {
                    result,
                    cached: true,
                });
            }
            Ok(None) => debug!("Cache miss for {}", key),
            Err(e) => warn!("Could not read cached crawl for {}: {}", key, e),
        }
    }

    let result = execute_crawl(options, None)
        .await
        .with_context(|| format!("Crawl of {} failed", key))?;

    if let Some(cache) = cache
        && let Err(e) = cache.upsert_website(&key, &result)
    {
        warn!("Could not cache crawl for {}: {}", key, e);
    }

    Ok(Fetched {
        result,
        cached: false,
    })
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let format = report_format(args)?;
    let mut options = crawl_options_from_args(args)?;
    options.show_progress_bars = !quiet;

    if !quiet {
        println!(
            "\n{} Crawling {} (max {} pages, depth {})\n",
            "→".blue().bold(),
            options.url.bright_white(),
            options.max_pages,
            options.max_depth
        );
    }

    let cache = open_cache(args);
    let fetched = crawl_with_cache(options, cache.as_ref()).await?;

    if fetched.cached && !quiet {
        println!("{} Using cached result", "ℹ".blue());
    }

    let report = generate_crawl_report(&fetched.result, format)
        .context("Failed to render crawl report")?;
    emit_report(&report, args.get_one::<PathBuf>("output"), quiet)
}

// ============================================================================
// Analyze
// ============================================================================

/// Looks the repository up in the cache, analyzing and storing it on a miss.
pub async fn analyze_with_cache(
    analyzer: &RouteAnalyzer,
    repo_url: &str,
    cache: Option<&ResultCache>,
) -> Result<Fetched<AnalysisResult>> {
    let key = parse_repo_url(repo_url)
        .map_err(AnalysisError::from)?
        .canonical_url();

    if let Some(cache) = cache {
        match cache.get_repository(&key) {
            Ok(Some(result)) => {
                debug!("Cache hit for {}", key);
                return Ok(Fetched {
                    result,
                    cached: true,
                });
            }
            Ok(None) => debug!("Cache miss for {}", key),
            Err(e) => warn!("Could not read cached analysis for {}: {}", key, e),
        }
    }

    let result = analyzer
        .analyze_repository(repo_url)
        .await
        .with_context(|| format!("Analysis of {} failed", key))?;

    if let Some(cache) = cache
        && let Err(e) = cache.upsert_repository(&key, &result)
    {
        warn!("Could not cache analysis for {}: {}", key, e);
    }

    Ok(Fetched {
        result,
        cached: false,
    })
}

pub async fn handle_analyze(args: &ArgMatches, quiet: bool) -> Result<()> {
    let format = report_format(args)?;
    let repo_url = args
        .get_one::<String>("repo")
        .context("--repo is required")?;
    let token = args
        .get_one::<String>("token")
        .filter(|t| !t.trim().is_empty())
        .cloned();
    let nested = args.get_flag("nested");

    if token.is_none() && !quiet {
        println!(
            "{} No GitHub token supplied; unauthenticated requests are limited to 60 per hour",
            "⚠".yellow().bold()
        );
    }

    let client = GitHubClient::new(token).context("Failed to build GitHub client")?;
    let analyzer = RouteAnalyzer::new(client);
    let cache = open_cache(args);

    let pb = (!quiet).then(|| spinner(format!("Analyzing {}...", repo_url)));
    let outcome = analyze_with_cache(&analyzer, repo_url, cache.as_ref()).await;
    if let Some(pb) = pb {
        match outcome {
            Ok(ref fetched) => pb.finish_with_message(format!(
                "Analysis complete! {} routes ({})",
                fetched.result.routes.len(),
                fetched.result.framework
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }
    let fetched = outcome?;

    if fetched.cached && !quiet {
        println!("{} Using cached result", "ℹ".blue());
    }

    let report = generate_analysis_report(repo_url, &fetched.result, nested, format)
        .context("Failed to render analysis report")?;
    emit_report(&report, args.get_one::<PathBuf>("output"), quiet)
}

// ============================================================================
// Cache
// ============================================================================

fn open_cache_strict(args: &ArgMatches) -> Result<(PathBuf, ResultCache)> {
    let raw = args
        .get_one::<String>("cache")
        .context("--cache has no value")?;
    let path = resolve_cache_path(raw);
    let cache = ResultCache::new(&path)
        .with_context(|| format!("Failed to open result cache at {}", path.display()))?;
    Ok((path, cache))
}

pub fn format_entry(entry: &CacheEntry) -> String {
    let when = Local
        .timestamp_opt(entry.created_at, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{:<10}  {}  {}", entry.kind.as_str(), when, entry.key)
}

pub fn handle_cache_list(args: &ArgMatches) -> Result<()> {
    let (path, cache) = open_cache_strict(args)?;
    let entries = cache.list().context("Failed to list cached results")?;

    if entries.is_empty() {
        println!("{} Cache at {} is empty", "ℹ".blue(), path.display());
        return Ok(());
    }

    println!("{}", format!("{} cached result(s)", entries.len()).bold());
    for entry in &entries {
        println!("  {}", format_entry(entry));
    }
    Ok(())
}

pub fn handle_cache_clear(args: &ArgMatches) -> Result<()> {
    let (path, cache) = open_cache_strict(args)?;
    let removed = cache.clear().context("Failed to clear the result cache")?;
    println!(
        "{} Removed {} cached result(s) from {}",
        "✓".green().bold(),
        removed,
        path.display()
    );
    Ok(())
}
