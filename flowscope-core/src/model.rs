use serde::{Deserialize, Serialize};
use std::fmt;

/// A URL pattern mapped to the component that renders it. Serializes as `RouteData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Route>>,
}

impl Route {
    pub fn new(path: impl Into<String>, component: impl Into<String>, file_path: &str) -> Self {
        Self {
            path: path.into(),
            component: component.into(),
            file_path: Some(file_path.to_string()),
            children: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "nextjs-app")]
    NextAppRouter,
    #[serde(rename = "nextjs-pages")]
    NextPagesRouter,
    #[serde(rename = "react-router")]
    ReactRouter,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::NextAppRouter => "nextjs-app",
            Framework::NextPagesRouter => "nextjs-pages",
            Framework::ReactRouter => "react-router",
            Framework::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub routes: Vec<Route>,
    pub framework: Framework,
    /// Number of `file` entries discovered.
    pub total_files: usize,
    /// Number of files that contributed at least one route.
    pub route_files: usize,
}

/// Folds a flat route list into a tree where `/a/b` becomes a child of `/a`.
///
/// Children keep their full paths. `/` never adopts children.
pub fn nest_routes(routes: &[Route]) -> Vec<Route> {
    let mut sorted = routes.to_vec();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut roots = Vec::new();
    for mut route in sorted {
        route.children = None;
        insert_nested(&mut roots, route);
    }
    roots
}

fn insert_nested(siblings: &mut Vec<Route>, route: Route) {
    match siblings
        .iter()
        .rposition(|parent| is_parent_path(&parent.path, &route.path))
    {
        Some(idx) => {
            let children = siblings[idx].children.get_or_insert_with(Vec::new);
            insert_nested(children, route);
        }
        None => siblings.push(route),
    }
}

fn is_parent_path(parent: &str, child: &str) -> bool {
    parent != "/"
        && child.len() > parent.len()
        && child.starts_with(parent)
        && child[parent.len()..].starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> Route {
        Route::new(path, "Page", &format!("pages{}.tsx", path))
    }

    #[test]
    fn test_framework_wire_names() {
        assert_eq!(
            serde_json::to_value(Framework::NextAppRouter).unwrap(),
            "nextjs-app"
        );
        let parsed: Framework = serde_json::from_str("\"react-router\"").unwrap();
        assert_eq!(parsed, Framework::ReactRouter);
    }

    #[test]
    fn test_route_omits_empty_optionals() {
        let json = serde_json::to_value(Route {
            path: "/".to_string(),
            component: "Home".to_string(),
            file_path: None,
            children: None,
        })
        .unwrap();
        assert!(json.get("file_path").is_none());
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_analysis_result_wire_shape() {
        let result = AnalysisResult {
            routes: vec![],
            framework: Framework::Unknown,
            total_files: 4,
            route_files: 0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["framework"], "unknown");
        assert_eq!(json["totalFiles"], 4);
        assert_eq!(json["routeFiles"], 0);
    }

    #[test]
    fn test_nest_routes() {
        let flat = vec![
            route("/dashboard/settings"),
            route("/"),
            route("/dashboard"),
            route("/dashboard-old"),
            route("/dashboard/settings/profile"),
            route("/about"),
        ];

        let nested = nest_routes(&flat);
        let top: Vec<&str> = nested.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(top, vec!["/", "/about", "/dashboard", "/dashboard-old"]);

        let dashboard = &nested[2];
        let children = dashboard.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path, "/dashboard/settings");
        assert_eq!(
            children[0].children.as_ref().unwrap()[0].path,
            "/dashboard/settings/profile"
        );
        assert!(nested[0].children.is_none());
    }

    #[test]
    fn test_nest_routes_keeps_duplicates() {
        let nested = nest_routes(&[route("/a"), route("/a")]);
        assert_eq!(nested.len(), 2);
    }
}
