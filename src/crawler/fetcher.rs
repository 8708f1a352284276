//! Concurrent, rate-limited page fetching.
//!
//! Fetches page bodies under a semaphore bounding in-flight requests to
//! twice the configured requests-per-second rate, with an explicit
//! post-fetch sleep throttling aggregate throughput. Non-text URLs are
//! skipped before any network call; responses with disallowed content types
//! are discarded after the fact; HTML and PDF bodies are converted to plain
//! text.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::CrawlError;
use super::convert::{self, DocumentKind};

const FETCH_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 1;
const BACKOFF_CAP_SECS: u64 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// File extensions excluded from fetching (checked on the URL path only,
/// case-insensitively). PDF is deliberately absent: it converts.
const SKIP_EXTENSIONS: &[&str] = &[
    // Images
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg",
    // Audio
    "mp3", "wav", "ogg", "m4a", "flac", "aac",
    // Video
    "mp4", "mov", "avi", "mkv", "webm", "flv", "wmv",
    // Office binaries
    "doc", "docx", "ppt", "pptx", "xls", "xlsx",
    // Archives
    "zip", "rar", "tar", "gz", "7z",
    // Raw data
    "csv", "json", "xml", "yaml", "yml",
    // Scripts & styles
    "js", "css", "ts", "jsx", "tsx",
    // Fonts
    "ttf", "otf", "woff", "woff2", "eot",
];

/// Content-type fragments whose bodies are discarded after fetching.
const SKIP_CONTENT_TYPES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/zip",
    "application/x-rar",
    "application/x-tar",
    "application/x-gzip",
    "application/x-7z-compressed",
    "application/javascript",
    "text/css",
    "font/",
    "application/font-woff",
    "application/font-sfnt",
    "application/vnd.ms-fontobject",
];

/// Per-URL fetch outcome.
///
/// Empty `content` with a `None` error means the URL was intentionally
/// skipped or carried nothing convertible; `error` is set only when the
/// fetch itself failed after retries.
#[derive(Clone, Debug, Default)]
pub struct FetchResult {
    pub url: String,
    pub content_type: String,
    pub content: String,
    pub title: String,
    pub error: Option<String>,
}

impl FetchResult {
    fn skipped(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

/// Concurrent content fetcher that respects a requests-per-second ceiling.
#[derive(Clone)]
pub struct ContentFetcher {
    client: Client,
    rate_limit: u32,
    semaphore: Arc<Semaphore>,
}

impl ContentFetcher {
    /// Build a fetcher for the given rate limit (requests per second).
    ///
    /// Concurrency is capped at `rate_limit * 2`; the post-fetch sleep of
    /// `1 / rate_limit` seconds enforces the aggregate ceiling independent
    /// of concurrency width.
    pub fn new(rate_limit: u32, user_agent: &str) -> Result<Self, CrawlError> {
        let rate_limit = rate_limit.max(1);
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml,application/pdf;q=0.9,*/*;q=0.8",
            ),
        );
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            rate_limit,
            semaphore: Arc::new(Semaphore::new(rate_limit as usize * 2)),
        })
    }

    /// Fetch every URL, returning a map from URL to its result.
    ///
    /// Failures are recorded per URL and never abort the batch.
    pub async fn fetch_urls(&self, urls: &[String]) -> FxHashMap<String, FetchResult> {
        let skipped = urls.iter().filter(|u| skip_by_extension(u)).count();
        if skipped > 0 {
            info!(skipped, "URLs excluded by extension filter");
        }

        let results = join_all(urls.iter().map(|url| self.fetch_url(url))).await;
        results
            .into_iter()
            .map(|result| (result.url.clone(), result))
            .collect()
    }

    /// Fetch and convert one URL.
    pub async fn fetch_url(&self, url: &str) -> FetchResult {
        if skip_by_extension(url) {
            debug!(%url, "skipping URL with disallowed extension");
            return FetchResult::skipped(url);
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("fetch semaphore closed");

        let (content_type, bytes) = match self.fetch_with_retries(url).await {
            Ok(response) => response,
            Err(message) => {
                warn!(%url, error = %message, "fetch failed after retries");
                return FetchResult {
                    url: url.to_string(),
                    error: Some(message),
                    ..Default::default()
                };
            }
        };

        // Aggregate throughput throttle, applied while the permit is held.
        tokio::time::sleep(Duration::from_secs_f64(1.0 / f64::from(self.rate_limit))).await;

        if SKIP_CONTENT_TYPES
            .iter()
            .any(|fragment| content_type.contains(fragment))
        {
            debug!(%url, %content_type, "discarding disallowed content type");
            return FetchResult {
                url: url.to_string(),
                content_type,
                ..Default::default()
            };
        }

        let kind = if content_type.contains("text/html")
            || content_type.contains("application/xhtml+xml")
        {
            Some(DocumentKind::Html)
        } else if content_type.contains("application/pdf") {
            Some(DocumentKind::Pdf)
        } else {
            debug!(%url, %content_type, "unsupported content type");
            None
        };

        let Some(kind) = kind else {
            return FetchResult {
                url: url.to_string(),
                content_type,
                ..Default::default()
            };
        };

        let converted = match convert::convert(kind, &bytes) {
            Ok(document) => document,
            Err(err) => {
                warn!(%url, error = %err, "conversion failed");
                if kind == DocumentKind::Html {
                    convert::lossy_text(&bytes)
                } else {
                    return FetchResult {
                        url: url.to_string(),
                        content_type,
                        ..Default::default()
                    };
                }
            }
        };

        FetchResult {
            url: url.to_string(),
            content_type,
            content: converted.text,
            title: converted.title,
            error: None,
        }
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<(String, Vec<u8>), String> {
        let mut attempt = 1u32;
        loop {
            match self.fetch_once(url).await {
                Ok(result) => return Ok(result),
                Err(FetchFailure::Retryable(message)) if attempt < FETCH_ATTEMPTS => {
                    let wait = backoff(attempt);
                    debug!(%url, attempt, error = %message, "retrying fetch in {wait:?}");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(FetchFailure::Retryable(message) | FetchFailure::Fatal(message)) => {
                    return Err(message);
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<(String, Vec<u8>), FetchFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchFailure::Retryable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP status {status} for {url}");
            return Err(if should_retry(status) {
                FetchFailure::Retryable(message)
            } else {
                FetchFailure::Fatal(message)
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchFailure::Retryable(e.to_string()))?
            .to_vec();

        Ok((content_type, bytes))
    }
}

enum FetchFailure {
    Retryable(String),
    Fatal(String),
}

fn should_retry(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn backoff(attempt: u32) -> Duration {
    let secs = BACKOFF_BASE_SECS << (attempt - 1);
    Duration::from_secs(secs.min(BACKOFF_CAP_SECS))
}

/// True when the URL path (query string and fragment ignored) ends in an
/// extension the crawl never fetches. Case-insensitive.
#[must_use]
pub fn skip_by_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let Some(segment) = path.rsplit('/').next() else {
        return false;
    };
    let Some((stem, extension)) = segment.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }
    let extension = extension.to_ascii_lowercase();
    SKIP_EXTENSIONS.contains(&extension.as_str())
}
