//! Per-site crawl orchestration.
//!
//! Drives one website through the pipeline: check the namespace, resolve the
//! sitemap, fetch pages, chunk content, and store the chunks, with tagged
//! failure exits at every stage. A failing site never aborts the remaining
//! sites.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::fetcher::ContentFetcher;
use super::sitemap::SitemapResolver;
use crate::chunker::{ChunkMetadata, TextChunk, TextChunker};
use crate::config::{CrawlConfig, WebsiteConfig};
use crate::settings::Settings;
use crate::stores::VectorStore;

/// Terminal status of one site's crawl.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrawlStatus {
    /// The full pipeline ran and chunks were stored.
    Success {
        pages_crawled: usize,
        chunks_stored: usize,
        /// Non-fatal per-page failures recorded along the way.
        errors: Vec<String>,
    },
    /// The site was not crawled (namespace already populated).
    Skipped { reason: String },
    /// A pipeline stage failed; `reason` is one of the tagged codes.
    Error { reason: String },
}

/// Result of crawling one configured website.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub namespace: String,
    #[serde(flatten)]
    pub status: CrawlStatus,
}

impl CrawlOutcome {
    fn error(namespace: &str, reason: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            status: CrawlStatus::Error {
                reason: reason.to_string(),
            },
        }
    }
}

/// Crawl a single website and store its content.
///
/// Recrawl policy: an existing namespace is skipped unless `recrawl` is set,
/// in which case it is deleted first and the site crawled fresh.
pub async fn crawl_website(
    website: &WebsiteConfig,
    store: &dyn VectorStore,
    settings: &Settings,
    recrawl: bool,
) -> CrawlOutcome {
    let namespace = website.namespace();

    let namespaces = match store.list_namespaces().await {
        Ok(namespaces) => namespaces,
        Err(err) => {
            error!(website = %website.name, error = %err, "failed to list namespaces");
            return CrawlOutcome::error(&namespace, "storage_failed");
        }
    };

    if namespaces.contains(&namespace) {
        if !recrawl {
            info!(%namespace, "namespace already exists, skipping (use recrawl to override)");
            return CrawlOutcome {
                namespace,
                status: CrawlStatus::Skipped {
                    reason: "already_exists".to_string(),
                },
            };
        }
        info!(%namespace, "deleting existing namespace for recrawl");
        if let Err(err) = store.delete_namespace(&namespace).await {
            error!(%namespace, error = %err, "failed to delete namespace");
            return CrawlOutcome::error(&namespace, "storage_failed");
        }
    }

    // Patterns were validated at config load; a failure here means the
    // configuration was constructed by hand and skipped validation.
    let (exclude, include_only) = match (
        website.exclude_regexes(),
        website.include_only_regexes(),
    ) {
        (Ok(exclude), Ok(include_only)) => (exclude, include_only),
        _ => return CrawlOutcome::error(&namespace, "invalid_patterns"),
    };

    info!(website = %website.name, sitemap = %website.xml_sitemap, "processing sitemap");
    let resolver = match SitemapResolver::new(&settings.user_agent) {
        Ok(resolver) => resolver,
        Err(err) => {
            error!(website = %website.name, error = %err, "failed to build sitemap resolver");
            return CrawlOutcome::error(&namespace, "no_pages_found");
        }
    };
    let page_urls = resolver
        .resolve(website.xml_sitemap.as_str(), &exclude, &include_only)
        .await;

    if page_urls.is_empty() {
        error!(website = %website.name, "no pages found in sitemap");
        return CrawlOutcome::error(&namespace, "no_pages_found");
    }

    info!(website = %website.name, pages = page_urls.len(), "fetching pages");
    let fetcher = match ContentFetcher::new(settings.crawl_rate_limit, &settings.user_agent) {
        Ok(fetcher) => fetcher,
        Err(err) => {
            error!(website = %website.name, error = %err, "failed to build fetcher");
            return CrawlOutcome::error(&namespace, "fetch_failed");
        }
    };
    let urls: Vec<String> = page_urls.into_iter().collect();
    let results = fetcher.fetch_urls(&urls).await;

    if results.is_empty() {
        error!(website = %website.name, "failed to fetch any content");
        return CrawlOutcome::error(&namespace, "fetch_failed");
    }

    // Chunk each page's converted text directly; the fetcher already did
    // the conversion.
    let chunker = TextChunker::default();
    let crawl_timestamp = Utc::now().to_rfc3339();
    let mut all_chunks: Vec<TextChunk> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    for (url, result) in &results {
        if let Some(error) = &result.error {
            errors.push(format!("Error fetching {url}: {error}"));
            continue;
        }
        // Empty content without an error is an intentional exclusion
        // (skipped extension, disallowed or unsupported content type).
        if result.content.is_empty() {
            continue;
        }

        let metadata =
            ChunkMetadata::new(url, &result.title, &crawl_timestamp, &website.name);
        all_chunks.extend(chunker.chunk_text(&result.content, &metadata));
    }

    if all_chunks.is_empty() {
        error!(website = %website.name, "no chunks produced from fetched content");
        return CrawlOutcome::error(&namespace, "no_chunks_created");
    }

    info!(
        website = %website.name,
        chunks = all_chunks.len(),
        %namespace,
        "storing chunks"
    );
    if let Err(err) = store.add_documents(&all_chunks, &namespace).await {
        error!(%namespace, error = %err, "failed to store chunks");
        return CrawlOutcome::error(&namespace, "storage_failed");
    }

    info!(
        website = %website.name,
        pages = results.len(),
        chunks = all_chunks.len(),
        "crawl complete"
    );
    CrawlOutcome {
        namespace,
        status: CrawlStatus::Success {
            pages_crawled: results.len(),
            chunks_stored: all_chunks.len(),
            errors,
        },
    }
}

/// Crawl every website in the configuration, one at a time.
pub async fn process_websites(
    config: &CrawlConfig,
    store: &dyn VectorStore,
    settings: &Settings,
    recrawl: bool,
) -> Vec<CrawlOutcome> {
    let mut outcomes = Vec::with_capacity(config.websites.len());
    for website in &config.websites {
        info!(website = %website.name, "processing website");
        outcomes.push(crawl_website(website, store, settings, recrawl).await);
    }

    for outcome in &outcomes {
        match &outcome.status {
            CrawlStatus::Success {
                pages_crawled,
                chunks_stored,
                errors,
            } => info!(
                namespace = %outcome.namespace,
                pages_crawled,
                chunks_stored,
                page_errors = errors.len(),
                "crawl succeeded"
            ),
            CrawlStatus::Skipped { reason } => {
                info!(namespace = %outcome.namespace, %reason, "crawl skipped");
            }
            CrawlStatus::Error { reason } => {
                warn!(namespace = %outcome.namespace, %reason, "crawl failed");
            }
        }
    }

    outcomes
}
