//! Best-effort source inspection.
//!
//! Nothing here parses JavaScript. Misses fall back to `"Component"`.

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_COMPONENT: &str = "Component";

static EXPORT_DEFAULT_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export\s+default\s+function\s+(\w+)").expect("valid export regex")
});
static CONST_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:export\s+default\s+)?const\s+(\w+)\s*=\s*\(").expect("valid const regex")
});
static NAMED_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"function\s+(\w+)\s*\(").expect("valid function regex"));

static ROUTE_TAG_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Route\b").expect("valid route tag regex"));
static PATH_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bpath=["']([^"']+)["']"#).expect("valid path regex"));
static COMPONENT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bcomponent=\{?\s*(\w+)").expect("valid component regex")
});
static ELEMENT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\belement=\{\s*<(\w+)").expect("valid element regex"));

/// A `<Route>` declaration found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsxRoute {
    pub path: String,
    pub component: Option<String>,
}

/// Extracts routing facts from source text.
pub trait SourceInspector: Send + Sync {
    /// Name of the component a module defines, if one can be recognised.
    fn component_name(&self, source: &str) -> Option<String>;

    /// `<Route path=...>` declarations in order of appearance.
    fn jsx_routes(&self, source: &str) -> Vec<JsxRoute>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegexInspector;

impl SourceInspector for RegexInspector {
    fn component_name(&self, source: &str) -> Option<String> {
        [&*EXPORT_DEFAULT_FUNCTION, &*CONST_ARROW, &*NAMED_FUNCTION]
            .iter()
            .find_map(|re| re.captures(source))
            .map(|caps| caps[1].to_string())
    }

    fn jsx_routes(&self, source: &str) -> Vec<JsxRoute> {
        let mut routes: Vec<JsxRoute> = ROUTE_TAG_START
            .find_iter(source)
            .filter_map(|m| {
                let tag = route_tag(&source[m.start()..]);
                let path = PATH_ATTR.captures(tag)?[1].to_string();
                let component = COMPONENT_ATTR
                    .captures(tag)
                    .or_else(|| ELEMENT_ATTR.captures(tag))
                    .map(|caps| caps[1].to_string());
                Some(JsxRoute { path, component })
            })
            .collect();

        // A path declared twice may only name its element once.
        for idx in 0..routes.len() {
            if routes[idx].component.is_none() {
                let path = &routes[idx].path;
                let sibling = routes
                    .iter()
                    .find(|r| &r.path == path && r.component.is_some())
                    .and_then(|r| r.component.clone());
                routes[idx].component = sibling;
            }
        }

        routes
    }
}

/// The opening tag starting at `source`, up to the `>` outside any `{...}`.
fn route_tag(source: &str) -> &str {
    let mut depth = 0usize;
    for (idx, ch) in source.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '>' if depth == 0 => return &source[..=idx],
            _ => {}
        }
    }
    source
}
