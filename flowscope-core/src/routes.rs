//! Framework detection and file-path to route-path conversion.
//!
//! Everything here is a pure function of the discovered file list.

use crate::model::Framework;
use flowscope_scanner::github::RepoFile;
use regex::Regex;
use std::sync::LazyLock;

static CODE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(tsx?|jsx?)$").expect("valid extension regex"));
static APP_PAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|/)page\.(tsx?|jsx?)$").expect("valid page regex"));
static CATCH_ALL_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[?\.\.\.([^\]]+)\]\]?").expect("valid catch-all regex")
});
static DYNAMIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").expect("valid dynamic segment regex"));

const APP_PAGE_NAMES: &[&str] = &["page.tsx", "page.ts", "page.jsx", "page.js"];
const ENTRY_STEMS: &[&str] = &["App", "index"];
const ROUTER_HINTS: &[&str] = &["router", "routes", "Route"];

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_entry_file_name(name: &str) -> bool {
    ENTRY_STEMS.iter().any(|stem| {
        name.strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|ext| matches!(ext, "js" | "jsx" | "ts" | "tsx"))
    })
}

pub fn has_code_extension(name: &str) -> bool {
    CODE_EXTENSION.is_match(name)
}

/// Picks the routing convention from the discovered paths. First match wins.
pub fn detect_framework(files: &[RepoFile]) -> Framework {
    let paths = || files.iter().map(|f| f.path.as_str());

    if paths().any(|p| p.starts_with("app/") && p.contains("page.")) {
        return Framework::NextAppRouter;
    }

    if paths().any(|p| p.starts_with("pages/") || p.starts_with("src/pages/")) {
        return Framework::NextPagesRouter;
    }

    if paths().any(|p| {
        ROUTER_HINTS.iter().any(|hint| p.contains(hint)) || is_entry_file_name(file_name(p))
    }) {
        return Framework::ReactRouter;
    }

    Framework::Unknown
}

/// Rewrites `[...x]` (and `[[...x]]`) to `:x*` and `[x]` to `:x`.
pub fn convert_dynamic_segments(route: &str) -> String {
    let catch_all = CATCH_ALL_SEGMENT.replace_all(route, ":$1*");
    DYNAMIC_SEGMENT.replace_all(&catch_all, ":$1").into_owned()
}

pub fn is_app_route_file(file: &RepoFile) -> bool {
    file.is_file() && file.path.starts_with("app/") && APP_PAGE_NAMES.contains(&file.name.as_str())
}

/// `app/blog/[slug]/page.tsx` becomes `/blog/:slug`.
pub fn app_router_path(file_path: &str) -> String {
    let route = file_path.strip_prefix("app/").unwrap_or(file_path);
    let route = APP_PAGE_SUFFIX.replace(route, "");
    if route.is_empty() {
        return "/".to_string();
    }
    format!("/{}", convert_dynamic_segments(&route))
}

/// The pages directory: a listed `pages` or `src/pages` entry, otherwise
/// whichever prefix the files use.
pub fn pages_directory(files: &[RepoFile]) -> &'static str {
    if let Some(dir) = files
        .iter()
        .find(|f| f.path == "pages" || f.path == "src/pages")
    {
        return if dir.path == "pages" { "pages" } else { "src/pages" };
    }

    let in_src = files.iter().any(|f| f.path.starts_with("src/pages/"));
    let at_root = files.iter().any(|f| f.path.starts_with("pages/"));
    if in_src && !at_root { "src/pages" } else { "pages" }
}

pub fn is_pages_route_file(file: &RepoFile, pages_dir: &str) -> bool {
    file.is_file()
        && file
            .path
            .strip_prefix(pages_dir)
            .is_some_and(|rest| rest.starts_with('/'))
        && has_code_extension(&file.name)
        && !file.name.starts_with('_')
}

/// `pages/blog/[id].tsx` becomes `/blog/:id`; `index` files map to their directory.
pub fn pages_router_path(file_path: &str, pages_dir: &str) -> String {
    let route = file_path
        .strip_prefix(pages_dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(file_path);
    let route = CODE_EXTENSION.replace(route, "");

    let route = if route == "index" {
        ""
    } else {
        route.strip_suffix("/index").unwrap_or(&route)
    };

    if route.is_empty() {
        return "/".to_string();
    }
    format!("/{}", convert_dynamic_segments(route))
}

/// Source files worth scanning for `<Route>` declarations.
pub fn is_router_candidate(file: &RepoFile) -> bool {
    file.is_file()
        && has_code_extension(&file.name)
        && (file.path.contains("App")
            || ROUTER_HINTS.iter().any(|hint| file.path.contains(hint)))
}

/// Router or app entry files get a synthetic `/` route when nothing else is found.
pub fn is_app_entry(file_path: &str) -> bool {
    file_path.contains("App.") || file_path.contains("index.")
}
