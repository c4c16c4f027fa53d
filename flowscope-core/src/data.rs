use crate::error::CacheError;
use crate::model::AnalysisResult;
use flowscope_scanner::result::CrawlResult;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

type Result<T> = std::result::Result<T, CacheError>;

/// Previously computed results keyed by normalized seed.
pub struct ResultCache {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Website,
    Repository,
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Website => "website",
            ProjectKind::Repository => "repository",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub kind: ProjectKind,
    pub key: String,
    /// Unix seconds of the last write.
    pub created_at: i64,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl ResultCache {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let cache = ResultCache { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    pub fn in_memory() -> Result<Self> {
        let cache = ResultCache {
            conn: Connection::open_in_memory()?,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS website_projects (
                website_url TEXT PRIMARY KEY,
                flow_data TEXT NOT NULL,   -- JSON WebsiteFlowData
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS repo_projects (
                repo_url TEXT PRIMARY KEY,
                parsed_data TEXT NOT NULL, -- JSON AnalysisResult
                created_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn get_website(&self, website_url: &str) -> Result<Option<CrawlResult>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT flow_data FROM website_projects WHERE website_url = ?1",
                params![website_url],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(CacheError::from)
    }

    pub fn upsert_website(&self, website_url: &str, result: &CrawlResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.conn.execute(
            "INSERT INTO website_projects (website_url, flow_data, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(website_url) DO UPDATE SET
                flow_data = excluded.flow_data,
                created_at = excluded.created_at",
            params![website_url, json, current_timestamp()],
        )?;
        debug!("Cached website analysis for {}", website_url);
        Ok(())
    }

    pub fn get_repository(&self, repo_url: &str) -> Result<Option<AnalysisResult>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT parsed_data FROM repo_projects WHERE repo_url = ?1",
                params![repo_url],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(CacheError::from)
    }

    pub fn upsert_repository(&self, repo_url: &str, result: &AnalysisResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.conn.execute(
            "INSERT INTO repo_projects (repo_url, parsed_data, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(repo_url) DO UPDATE SET
                parsed_data = excluded.parsed_data,
                created_at = excluded.created_at",
            params![repo_url, json, current_timestamp()],
        )?;
        debug!("Cached repository analysis for {}", repo_url);
        Ok(())
    }

    /// Every cached entry, newest first.
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT 'website', website_url, created_at FROM website_projects
             UNION ALL
             SELECT 'repository', repo_url, created_at FROM repo_projects
             ORDER BY 3 DESC, 2",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                Ok(CacheEntry {
                    kind: if kind == "website" {
                        ProjectKind::Website
                    } else {
                        ProjectKind::Repository
                    },
                    key: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Removes every entry, returning how many were dropped.
    pub fn clear(&self) -> Result<usize> {
        let websites = self.conn.execute("DELETE FROM website_projects", [])?;
        let repos = self.conn.execute("DELETE FROM repo_projects", [])?;
        Ok(websites + repos)
    }
}
