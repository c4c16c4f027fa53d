// Integration tests for repository route analysis against a mock GitHub API

use flowscope_core::analyzer::{AnalyzeOptions, RouteAnalyzer};
use flowscope_core::error::AnalysisError;
use flowscope_core::model::{Framework, Route};
use flowscope_scanner::error::FailureKind;
use flowscope_scanner::github::GitHubClient;
use base64::Engine;
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn github_with_repo() -> MockServer {
    let server = MockServer::start().await;
    let reset = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;

    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rate": { "limit": 5000, "remaining": 4990, "reset": reset, "used": 10 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/site"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "site",
            "full_name": "acme/site",
            "description": null,
            "language": "TypeScript",
            "default_branch": "main",
            "private": false
        })))
        .mount(&server)
        .await;

    server
}

async fn mount_search(server: &MockServer, paths: &[&str]) {
    let items: Vec<_> = paths
        .iter()
        .map(|p| {
            json!({
                "name": p.rsplit('/').next().unwrap(),
                "path": p,
                "sha": format!("sha-{}", p)
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, file_path: &str, content: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/site/contents/{}", file_path)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": file_path.rsplit('/').next().unwrap(),
            "path": file_path,
            "type": "file",
            "sha": "abc",
            "content": base64::engine::general_purpose::STANDARD.encode(content)
        })))
        .mount(server)
        .await;
}

fn analyzer_for(server: &MockServer) -> RouteAnalyzer {
    let client = GitHubClient::builder()
        .api_base(server.uri())
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    RouteAnalyzer::new(client)
}

// ============================================================================
// Framework Scenarios
// ============================================================================

#[tokio::test]
async fn test_next_app_router_repository() {
    let server = github_with_repo().await;
    mount_search(
        &server,
        &[
            "app/page.tsx",
            "app/blog/[slug]/page.tsx",
            "app/layout.tsx",
            "pages/index.tsx",
        ],
    )
    .await;
    mount_file(&server, "app/page.tsx", "export default function Home() { return null }").await;

    let result = analyzer_for(&server)
        .analyze_repository("https://github.com/acme/site")
        .await
        .unwrap();

    assert_eq!(result.framework, Framework::NextAppRouter);
    assert_eq!(result.total_files, 4);
    assert_eq!(result.route_files, 2);
    assert_eq!(
        result.routes,
        vec![
            Route::new("/", "Home", "app/page.tsx"),
            Route::new("/blog/:slug", "Component", "app/blog/[slug]/page.tsx"),
        ]
    );
}

#[tokio::test]
async fn test_next_pages_router_in_src() {
    let server = github_with_repo().await;
    mount_search(
        &server,
        &[
            "src/pages/index.tsx",
            "src/pages/_app.tsx",
            "src/pages/about.tsx",
            "src/pages/blog/[id].tsx",
        ],
    )
    .await;
    mount_file(&server, "src/pages/about.tsx", "const About = () => null\nexport default About").await;

    let result = analyzer_for(&server)
        .analyze_repository("https://github.com/acme/site.git")
        .await
        .unwrap();

    assert_eq!(result.framework, Framework::NextPagesRouter);
    assert_eq!(result.route_files, 3);
    let paths: Vec<&str> = result.routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/", "/about", "/blog/:id"]);
    assert_eq!(result.routes[1].component, "About");
}

#[tokio::test]
async fn test_react_router_repository() {
    let server = github_with_repo().await;
    mount_search(&server, &["src/App.jsx", "src/routes/config.ts", "src/main.jsx"]).await;
    mount_file(
        &server,
        "src/App.jsx",
        r#"
        export default function App() {
          return (
            <Routes>
              <Route path="/" element={<Home />} />
              <Route path="/users/:id" element={<UserProfile />} />
              <Route path="/legacy" component={Legacy} />
            </Routes>
          );
        }
        "#,
    )
    .await;
    mount_file(&server, "src/routes/config.ts", "export const routes = []").await;

    let result = analyzer_for(&server)
        .analyze_repository("https://github.com/acme/site")
        .await
        .unwrap();

    assert_eq!(result.framework, Framework::ReactRouter);
    assert_eq!(result.route_files, 1);
    let found: Vec<(&str, &str)> = result
        .routes
        .iter()
        .map(|r| (r.path.as_str(), r.component.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("/", "Home"),
            ("/users/:id", "UserProfile"),
            ("/legacy", "Legacy"),
        ]
    );
}

#[tokio::test]
async fn test_react_router_entry_file_gets_synthetic_root() {
    let server = github_with_repo().await;
    mount_search(&server, &["src/App.tsx"]).await;
    mount_file(&server, "src/App.tsx", "export default function Shell() { return <div/> }").await;

    let result = analyzer_for(&server)
        .analyze_repository("https://github.com/acme/site")
        .await
        .unwrap();

    assert_eq!(result.routes, vec![Route::new("/", "Shell", "src/App.tsx")]);
    assert_eq!(result.route_files, 1);
}

#[tokio::test]
async fn test_repository_without_routes_is_unknown() {
    let server = github_with_repo().await;
    mount_search(&server, &[]).await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/site/contents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "README.md", "path": "README.md", "type": "file", "sha": "1" },
            { "name": "Cargo.toml", "path": "Cargo.toml", "type": "file", "sha": "2" }
        ])))
        .mount(&server)
        .await;

    let result = analyzer_for(&server)
        .analyze_repository("https://github.com/acme/site")
        .await
        .unwrap();

    assert_eq!(result.framework, Framework::Unknown);
    assert!(result.routes.is_empty());
    assert_eq!(result.route_files, 0);
    assert_eq!(result.total_files, 0);
}

// ============================================================================
// Failure Scenarios
// ============================================================================

#[tokio::test]
async fn test_missing_repository() {
    let server = github_with_repo().await;

    let err = analyzer_for(&server)
        .analyze_repository("https://github.com/acme/missing")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::RepositoryNotFound(_)));
    assert_eq!(err.kind(), FailureKind::NotFound);
}

#[tokio::test]
async fn test_invalid_repository_url() {
    let server = MockServer::start().await;

    let err = analyzer_for(&server)
        .analyze_repository("https://gitlab.com/acme/site")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::InvalidRepoUrl(_)));
    assert_eq!(err.kind(), FailureKind::InvalidInput);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_discovery_times_out() {
    let server = github_with_repo().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = analyzer_for(&server)
        .with_discovery_timeout(Duration::from_millis(200))
        .analyze_repository("https://github.com/acme/site")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Timeout(_)));
    assert_eq!(err.kind(), FailureKind::Timeout);
}

#[tokio::test]
async fn test_overall_deadline() {
    let server = github_with_repo().await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = analyzer_for(&server)
        .with_options(AnalyzeOptions {
            discovery_timeout: Duration::from_secs(60),
            deadline: Some(Duration::from_millis(200)),
        })
        .analyze_repository("https://github.com/acme/site")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Timeout);
}
