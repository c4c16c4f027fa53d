use crate::error::AnalysisError;
use crate::inspect::{DEFAULT_COMPONENT, RegexInspector, SourceInspector};
use crate::model::{AnalysisResult, Framework, Route};
use crate::routes::{
    app_router_path, detect_framework, is_app_entry, is_app_route_file, is_pages_route_file,
    is_router_candidate, pages_directory, pages_router_path,
};
use flowscope_scanner::github::{GitHubClient, RepoFile, RepoRef};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, AnalysisError>;

pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(180);

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Budget for listing the repository's files.
    pub discovery_timeout: Duration,
    /// Budget for the whole analysis; `None` disables it.
    pub deadline: Option<Duration>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            discovery_timeout: DISCOVERY_TIMEOUT,
            deadline: Some(DEFAULT_DEADLINE),
        }
    }
}

/// Derives a route table from a GitHub repository's file layout.
pub struct RouteAnalyzer {
    client: GitHubClient,
    inspector: Box<dyn SourceInspector>,
    options: AnalyzeOptions,
}

impl RouteAnalyzer {
    pub fn new(client: GitHubClient) -> Self {
        Self {
            client,
            inspector: Box::new(RegexInspector),
            options: AnalyzeOptions::default(),
        }
    }

    pub fn with_inspector(mut self, inspector: impl SourceInspector + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    pub fn with_options(mut self, options: AnalyzeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.options.discovery_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.options.deadline = deadline;
        self
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub async fn analyze_repository(&self, repo_url: &str) -> Result<AnalysisResult> {
        match self.options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.analyze(repo_url))
                .await
                .map_err(|_| AnalysisError::Timeout(deadline))?,
            None => self.analyze(repo_url).await,
        }
    }

    async fn analyze(&self, repo_url: &str) -> Result<AnalysisResult> {
        let repo = self.client.parse_repo_url(repo_url)?;

        if !self.client.validate_repo(&repo.owner, &repo.repo).await? {
            return Err(AnalysisError::RepositoryNotFound(repo.full_name()));
        }

        let info = self.client.get_repo_info(&repo.owner, &repo.repo).await?;
        let branch = info.default_branch;

        info!("Starting analysis of {}", repo.full_name());
        let started = Instant::now();

        let files = tokio::time::timeout(
            self.options.discovery_timeout,
            self.client.get_repo_contents(&repo.owner, &repo.repo, &branch),
        )
        .await
        .map_err(|_| AnalysisError::Timeout(self.options.discovery_timeout))??;

        info!(
            "Found {} files in {}/{} (took {}ms)",
            files.len(),
            repo.owner,
            repo.repo,
            started.elapsed().as_millis()
        );

        let framework = detect_framework(&files);
        debug!("Detected framework: {}", framework);

        let (routes, route_files) = match framework {
            Framework::NextAppRouter => self.app_router_routes(&repo, &files, &branch).await,
            Framework::NextPagesRouter => self.pages_router_routes(&repo, &files, &branch).await,
            Framework::ReactRouter => self.react_router_routes(&repo, &files, &branch).await,
            Framework::Unknown => (Vec::new(), 0),
        };

        Ok(AnalysisResult {
            routes,
            framework,
            total_files: files.iter().filter(|f| f.is_file()).count(),
            route_files,
        })
    }

    async fn app_router_routes(
        &self,
        repo: &RepoRef,
        files: &[RepoFile],
        branch: &str,
    ) -> (Vec<Route>, usize) {
        let route_files: Vec<&RepoFile> = files.iter().filter(|f| is_app_route_file(f)).collect();

        let mut routes = Vec::with_capacity(route_files.len());
        for file in &route_files {
            let component = self.component_for(repo, &file.path, branch).await;
            routes.push(Route::new(app_router_path(&file.path), component, &file.path));
        }

        routes.sort_by(|a, b| a.path.cmp(&b.path));
        (routes, route_files.len())
    }

    async fn pages_router_routes(
        &self,
        repo: &RepoRef,
        files: &[RepoFile],
        branch: &str,
    ) -> (Vec<Route>, usize) {
        let pages_dir = pages_directory(files);
        let route_files: Vec<&RepoFile> = files
            .iter()
            .filter(|f| is_pages_route_file(f, pages_dir))
            .collect();

        let mut routes = Vec::with_capacity(route_files.len());
        for file in &route_files {
            let component = self.component_for(repo, &file.path, branch).await;
            routes.push(Route::new(
                pages_router_path(&file.path, pages_dir),
                component,
                &file.path,
            ));
        }

        routes.sort_by(|a, b| a.path.cmp(&b.path));
        (routes, route_files.len())
    }

    async fn react_router_routes(
        &self,
        repo: &RepoRef,
        files: &[RepoFile],
        branch: &str,
    ) -> (Vec<Route>, usize) {
        let mut routes = Vec::new();
        let mut route_files = 0;

        for file in files.iter().filter(|f| is_router_candidate(f)) {
            let content = match self
                .client
                .get_file_content(&repo.owner, &repo.repo, &file.path, branch)
                .await
            {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to analyze {}: {}", file.path, e);
                    continue;
                }
            };

            let found = self.routes_in_source(&content, &file.path);
            if !found.is_empty() {
                route_files += 1;
            }
            routes.extend(found);
        }

        (routes, route_files)
    }

    fn routes_in_source(&self, content: &str, file_path: &str) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .inspector
            .jsx_routes(content)
            .into_iter()
            .map(|r| {
                let component = r.component.unwrap_or_else(|| DEFAULT_COMPONENT.to_string());
                Route::new(r.path, component, file_path)
            })
            .collect();

        if routes.is_empty() && is_app_entry(file_path) {
            let component = self
                .inspector
                .component_name(content)
                .unwrap_or_else(|| "App".to_string());
            routes.push(Route::new("/", component, file_path));
        }

        routes
    }

    /// Component defined by a file; a failed fetch is not fatal.
    async fn component_for(&self, repo: &RepoRef, path: &str, branch: &str) -> String {
        let name = match self
            .client
            .get_file_content(&repo.owner, &repo.repo, path, branch)
            .await
        {
            Ok(content) => self.inspector.component_name(&content),
            Err(e) => {
                warn!("Could not read {} for its component name: {}", path, e);
                None
            }
        };
        name.unwrap_or_else(|| DEFAULT_COMPONENT.to_string())
    }
}

/// Analyzes `repo_url` with a fresh client.
pub async fn analyze_repository(
    repo_url: &str,
    token: Option<String>,
) -> Result<AnalysisResult> {
    let client = GitHubClient::new(token)?;
    RouteAnalyzer::new(client).analyze_repository(repo_url).await
}
