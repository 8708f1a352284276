//! Integration tests for recursive sitemap resolution against a mock
//! HTTP server.

use httpmock::prelude::*;
use regex::Regex;

use crawlsmith::crawler::SitemapResolver;

fn urlset(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|url| format!("  <url><loc>{url}</loc></url>\n"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</urlset>"
    )
}

fn sitemapindex(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|url| format!("  <sitemap><loc>{url}</loc></sitemap>\n"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</sitemapindex>"
    )
}

fn resolver() -> SitemapResolver {
    SitemapResolver::new("crawlsmith-tests/0.1").expect("client builds")
}

#[tokio::test]
async fn resolves_nested_sitemaps_recursively() {
    let server = MockServer::start_async().await;

    let index = server
        .mock_async(|when, then| {
            when.method(GET).path("/sitemap.xml");
            then.status(200)
                .body(sitemapindex(&[format!("{}/nested.xml", server.base_url())]));
        })
        .await;
    let nested = server
        .mock_async(|when, then| {
            when.method(GET).path("/nested.xml");
            then.status(200).body(urlset(&[
                format!("{}/a", server.base_url()),
                format!("{}/b", server.base_url()),
            ]));
        })
        .await;

    let pages = resolver()
        .resolve(&format!("{}/sitemap.xml", server.base_url()), &[], &[])
        .await;

    index.assert_async().await;
    nested.assert_async().await;
    assert_eq!(pages.len(), 2);
    assert!(pages.contains(&format!("{}/a", server.base_url())));
}

#[tokio::test]
async fn cyclic_sitemap_indexes_terminate_with_single_fetches() {
    let server = MockServer::start_async().await;

    // A references B and itself; B references A. Each must be fetched once.
    let sitemap_a = server
        .mock_async(|when, then| {
            when.method(GET).path("/a.xml");
            then.status(200).body(sitemapindex(&[
                format!("{}/b.xml", server.base_url()),
                format!("{}/a.xml", server.base_url()),
            ]));
        })
        .await;
    let sitemap_b = server
        .mock_async(|when, then| {
            when.method(GET).path("/b.xml");
            then.status(200).body(format!(
                "{}\n",
                urlset(&[format!("{}/page", server.base_url())])
            ));
        })
        .await;

    let pages = resolver()
        .resolve(&format!("{}/a.xml", server.base_url()), &[], &[])
        .await;

    assert_eq!(sitemap_a.hits_async().await, 1);
    assert_eq!(sitemap_b.hits_async().await, 1);
    assert_eq!(pages.len(), 1);
}

#[tokio::test]
async fn exclude_takes_precedence_over_include() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sitemap.xml");
            then.status(200).body(urlset(&[
                "https://x.com/a".to_string(),
                "https://x.com/b".to_string(),
                "https://x.com/c".to_string(),
            ]));
        })
        .await;

    let exclude = vec![Regex::new("/b").unwrap()];
    let include = vec![Regex::new("/a").unwrap(), Regex::new("/b").unwrap()];
    let pages = resolver()
        .resolve(
            &format!("{}/sitemap.xml", server.base_url()),
            &exclude,
            &include,
        )
        .await;

    assert_eq!(pages.len(), 1);
    assert!(pages.contains("https://x.com/a"));
}

#[tokio::test]
async fn malformed_sitemap_recovers_bare_locs() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sitemap.xml");
            // Unclosed <url> element: the strict parser rejects this.
            then.status(200)
                .body("<urlset><url><loc>https://x.com/kept</loc></urlset>");
        })
        .await;

    let pages = resolver()
        .resolve(&format!("{}/sitemap.xml", server.base_url()), &[], &[])
        .await;

    assert_eq!(pages.len(), 1);
    assert!(pages.contains("https://x.com/kept"));
}

#[tokio::test]
async fn failing_sitemap_is_retried_then_skipped() {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path("/broken.xml");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sitemap.xml");
            then.status(200).body(sitemapindex(&[
                format!("{}/broken.xml", server.base_url()),
                format!("{}/good.xml", server.base_url()),
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/good.xml");
            then.status(200)
                .body(urlset(&["https://x.com/page".to_string()]));
        })
        .await;

    let pages = resolver()
        .resolve(&format!("{}/sitemap.xml", server.base_url()), &[], &[])
        .await;

    // Three attempts on the failing sitemap, and the good one still lands.
    assert_eq!(failing.hits_async().await, 3);
    assert_eq!(pages.len(), 1);
}
