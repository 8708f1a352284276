//! XML sitemap resolution.
//!
//! Expands a root sitemap into the full set of page URLs, following nested
//! `<sitemap>` index entries recursively. Leaf `<url>` entries are filtered
//! through the website's exclude and include-only patterns; sitemap index
//! URLs are never filtered. A sitemap that cannot be fetched or parsed is
//! skipped without failing the overall resolution.

use std::collections::HashSet;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_ENCODING, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::CrawlError;

const FETCH_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_SECS: u64 = 1;
const BACKOFF_CAP_SECS: u64 = 10;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Resolves sitemaps into deduplicated page URL sets.
#[derive(Clone, Debug)]
pub struct SitemapResolver {
    client: Client,
}

impl SitemapResolver {
    /// Build a resolver with its own HTTP client.
    ///
    /// The client decodes gzip and brotli transfer encodings transparently
    /// and carries the configured crawl user agent on every request.
    pub fn new(user_agent: &str) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xml,application/xhtml+xml,*/*"),
        );
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Recursively resolve `sitemap_url` into the set of page URLs it
    /// reaches, applying `exclude` then `include_only` to leaf entries.
    ///
    /// Processing order across pending sitemaps is unspecified; each sitemap
    /// is fetched at most once even when indexes reference each other.
    pub async fn resolve(
        &self,
        sitemap_url: &str,
        exclude: &[Regex],
        include_only: &[Regex],
    ) -> HashSet<String> {
        let mut pages: HashSet<String> = HashSet::new();
        let mut processed: HashSet<String> = HashSet::new();
        let mut pending: Vec<String> = vec![sitemap_url.to_string()];

        while let Some(current) = pending.pop() {
            if !processed.insert(current.clone()) {
                continue;
            }
            info!(sitemap = %current, "processing sitemap");

            let content = match self.fetch_sitemap(&current).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(sitemap = %current, error = %err, "skipping sitemap after failed fetch");
                    continue;
                }
            };

            let (page_urls, sitemap_urls) = match parse_sitemap(&content) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(sitemap = %current, error = %err, "strict parse failed, trying lenient recovery");
                    match parse_lenient(&content) {
                        Some(urls) => (urls, Vec::new()),
                        None => {
                            warn!(sitemap = %current, "unable to recover any URLs, dropping sitemap");
                            continue;
                        }
                    }
                }
            };

            for url in page_urls {
                if exclude.iter().any(|pattern| pattern.is_match(&url)) {
                    continue;
                }
                if !include_only.is_empty()
                    && !include_only.iter().any(|pattern| pattern.is_match(&url))
                {
                    continue;
                }
                pages.insert(url);
            }
            pending.extend(sitemap_urls);
        }

        info!(sitemap = %sitemap_url, pages = pages.len(), "sitemap resolution complete");
        pages
    }

    /// Fetch one sitemap's raw bytes, retrying transient failures with
    /// exponential backoff.
    async fn fetch_sitemap(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        let mut attempt = 1u32;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt < FETCH_ATTEMPTS => {
                    let wait = backoff(attempt);
                    debug!(sitemap = %url, attempt, error = %err, "retrying sitemap fetch in {wait:?}");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, CrawlError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        // reqwest strips the content-encoding header for the schemes it
        // decoded; anything still present names a scheme the transport did
        // not handle.
        if let Some(encoding) = response.headers().get(CONTENT_ENCODING) {
            let encoding = encoding.to_str().unwrap_or("").to_ascii_lowercase();
            if !encoding.is_empty() && encoding != "identity" {
                warn!(sitemap = %url, %encoding, "undecoded content-encoding on sitemap response");
            }
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.starts_with(&GZIP_MAGIC) {
            // Some origins serve .xml.gz with a misleading header set; the
            // parser will reject it and the sitemap gets skipped.
            warn!(sitemap = %url, "sitemap body still looks gzip-compressed after transport decoding");
        }
        debug!(sitemap = %url, bytes = bytes.len(), "fetched sitemap");
        Ok(bytes)
    }
}

fn backoff(attempt: u32) -> Duration {
    let secs = BACKOFF_BASE_SECS << (attempt - 1);
    Duration::from_secs(secs.min(BACKOFF_CAP_SECS))
}

#[derive(Clone, Copy, PartialEq)]
enum LocParent {
    None,
    Url,
    Sitemap,
}

fn push_loc(text: &str, parent: LocParent, pages: &mut Vec<String>, sitemaps: &mut Vec<String>) {
    let url = text.trim();
    if url.is_empty() {
        return;
    }
    match parent {
        LocParent::Url => pages.push(url.to_string()),
        LocParent::Sitemap => sitemaps.push(url.to_string()),
        LocParent::None => {}
    }
}

/// Parse a sitemap document, separating leaf page URLs from nested sitemap
/// URLs by their parent element (`<url>` vs `<sitemap>`).
fn parse_sitemap(content: &[u8]) -> Result<(Vec<String>, Vec<String>), quick_xml::Error> {
    let mut reader = Reader::from_reader(content);
    reader.trim_text(true);

    let mut pages = Vec::new();
    let mut sitemaps = Vec::new();
    let mut parent = LocParent::None;
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"url" => parent = LocParent::Url,
                b"sitemap" => parent = LocParent::Sitemap,
                b"loc" => in_loc = true,
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"url" | b"sitemap" => parent = LocParent::None,
                b"loc" => in_loc = false,
                _ => {}
            },
            Event::Text(ref e) => {
                if in_loc {
                    push_loc(&e.unescape()?, parent, &mut pages, &mut sitemaps);
                }
            }
            Event::CData(ref e) => {
                if in_loc {
                    let text = String::from_utf8_lossy(e).into_owned();
                    push_loc(&text, parent, &mut pages, &mut sitemaps);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((pages, sitemaps))
}

/// Lenient recovery for malformed sitemaps: run the bytes through a
/// forgiving HTML parser and collect the text of any `<loc>` element.
fn parse_lenient(content: &[u8]) -> Option<Vec<String>> {
    let text = String::from_utf8_lossy(content);
    let document = Html::parse_document(&text);
    let selector = Selector::parse("loc").expect("static selector");

    let urls: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();

    if urls.is_empty() { None } else { Some(urls) }
}
