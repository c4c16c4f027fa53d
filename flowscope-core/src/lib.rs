pub mod analyzer;
pub mod crawl;
pub mod data;
pub mod error;
pub mod inspect;
pub mod model;
pub mod report;
pub mod routes;

pub use analyzer::{AnalyzeOptions, RouteAnalyzer, analyze_repository};
pub use error::{AnalysisError, CacheError};
pub use model::{AnalysisResult, Framework, Route, nest_routes};
