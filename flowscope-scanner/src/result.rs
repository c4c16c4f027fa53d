use serde::{Deserialize, Serialize};

/// A single crawled page. Serializes as `WebsitePageData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub url: String,
    pub title: String,
    pub path: String,
    /// Every outbound link found on the page, internal or not.
    pub links: Vec<String>,
    #[serde(default)]
    pub is_entry_point: bool,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Navigation,
    Form,
    Button,
    Link,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Navigation => "navigation",
            ConnectionKind::Form => "form",
            ConnectionKind::Button => "button",
            ConnectionKind::Link => "link",
        }
    }
}

/// Directed edge between two collected pages, by page id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: ConnectionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlMetadata {
    pub base_url: String,
    pub total_pages: usize,
    pub max_depth: usize,
    /// Milliseconds from crawl start to result assembly.
    pub crawl_time: u64,
}

/// Outcome of a website crawl. Serializes as `WebsiteFlowData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub pages: Vec<Page>,
    pub connections: Vec<Connection>,
    pub metadata: CrawlMetadata,
}

impl CrawlResult {
    pub fn entry_point(&self) -> Option<&Page> {
        self.pages.iter().find(|p| p.is_entry_point)
    }

    pub fn page_by_id(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }
}
