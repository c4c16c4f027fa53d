// Report generation for crawl and route analysis results

use crate::model::{AnalysisResult, Route, nest_routes};
use flowscope_scanner::result::CrawlResult;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push('\n');
}

pub fn generate_crawl_report(result: &CrawlResult, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(crawl_text_report(result)),
        ReportFormat::Json => json_envelope("website", &result.metadata.base_url, result),
    }
}

pub fn generate_analysis_report(
    repo_url: &str,
    result: &AnalysisResult,
    nested: bool,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(analysis_text_report(repo_url, result, nested)),
        ReportFormat::Json if nested => {
            let shaped = AnalysisResult {
                routes: nest_routes(&result.routes),
                ..result.clone()
            };
            json_envelope("repository", repo_url, &shaped)
        }
        ReportFormat::Json => json_envelope("repository", repo_url, result),
    }
}

fn json_envelope<T: serde::Serialize>(
    kind: &str,
    target: &str,
    data: &T,
) -> Result<String, serde_json::Error> {
    let report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Flowscope",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
                "kind": kind,
                "target": target,
            },
            "data": data,
        }
    });

    serde_json::to_string_pretty(&report)
}

pub fn crawl_text_report(result: &CrawlResult) -> String {
    let mut report = String::new();

    section(&mut report, "                          FLOWSCOPE WEBSITE MAP");
    report.push_str(&format!("Site:         {}\n", result.metadata.base_url));
    report.push_str(&format!("Pages:        {}\n", result.metadata.total_pages));
    report.push_str(&format!("Connections:  {}\n", result.connections.len()));
    report.push_str(&format!("Max Depth:    {}\n", result.metadata.max_depth));
    report.push_str(&format!("Crawl Time:   {} ms\n\n", result.metadata.crawl_time));

    section(&mut report, "PAGES");
    if result.pages.is_empty() {
        report.push_str("  (empty)\n");
    }

    let mut by_depth: BTreeMap<usize, Vec<_>> = BTreeMap::new();
    for page in &result.pages {
        by_depth.entry(page.depth).or_default().push(page);
    }

    for (depth, pages) in &by_depth {
        report.push_str(&format!("Depth {}\n", depth));
        for (i, page) in pages.iter().enumerate() {
            let prefix = if i == pages.len() - 1 { "└── " } else { "├── " };
            let marker = if page.is_entry_point { " [entry]" } else { "" };
            report.push_str(&format!(
                "{}{}  \"{}\"  ({} links){}\n",
                prefix,
                page.path,
                page.title,
                page.links.len(),
                marker
            ));
        }
        report.push('\n');
    }

    if !result.connections.is_empty() {
        section(&mut report, "CONNECTIONS");
        for conn in &result.connections {
            report.push_str(&format!(
                "  {} → {}  ({})\n",
                conn.source,
                conn.target,
                conn.kind.as_str()
            ));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("\nGenerated by Flowscope\n\n");
    report
}

pub fn analysis_text_report(repo_url: &str, result: &AnalysisResult, nested: bool) -> String {
    let mut report = String::new();

    section(&mut report, "                         FLOWSCOPE ROUTE ANALYSIS");
    report.push_str(&format!("Repository:   {}\n", repo_url));
    report.push_str(&format!("Framework:    {}\n", result.framework));
    report.push_str(&format!("Files:        {}\n", result.total_files));
    report.push_str(&format!("Route Files:  {}\n", result.route_files));
    report.push_str(&format!("Routes:       {}\n\n", result.routes.len()));

    section(&mut report, "ROUTES");
    if result.routes.is_empty() {
        report.push_str("  (no routes found)\n");
    } else if nested {
        write_route_tree(&mut report, &nest_routes(&result.routes), 0);
    } else {
        let width = result
            .routes
            .iter()
            .map(|r| r.path.chars().count())
            .max()
            .unwrap_or(0);
        for route in &result.routes {
            report.push_str(&format!(
                "  {:<width$}  {}{}\n",
                route.path,
                route.component,
                file_suffix(route),
                width = width
            ));
        }
    }
    report.push('\n');

    report.push_str(RULE);
    report.push_str("\nGenerated by Flowscope\n\n");
    report
}

fn file_suffix(route: &Route) -> String {
    route
        .file_path
        .as_ref()
        .map(|f| format!("  ({})", f))
        .unwrap_or_default()
}

fn write_route_tree(report: &mut String, routes: &[Route], level: usize) {
    let indent = "    ".repeat(level);
    for (i, route) in routes.iter().enumerate() {
        let prefix = if i == routes.len() - 1 { "└── " } else { "├── " };
        report.push_str(&format!(
            "{}{}{}  {}{}\n",
            indent,
            prefix,
            route.path,
            route.component,
            file_suffix(route)
        ));
        if let Some(ref children) = route.children {
            write_route_tree(report, children, level + 1);
        }
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
