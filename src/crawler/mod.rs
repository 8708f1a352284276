//! The crawl pipeline: sitemap resolution, content fetching, conversion,
//! and the per-site orchestrator.

pub mod convert;
pub mod fetcher;
pub mod processor;
pub mod sitemap;

use thiserror::Error;

pub use convert::{ConvertedDocument, DocumentKind};
pub use fetcher::{ContentFetcher, FetchResult};
pub use processor::{CrawlOutcome, CrawlStatus, crawl_website, process_websites};
pub use sitemap::SitemapResolver;

/// Errors raised by the crawl pipeline.
///
/// Transient failures inside the pipeline are retried and degraded in
/// place; this covers the setup paths that have no degraded mode.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client construction or a non-degradable transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
