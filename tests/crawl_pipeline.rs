//! End-to-end crawl orchestration: sitemap → fetch → chunk → store, with
//! the skip/recrawl policy, against a mock site and the in-memory store.

mod common;

use std::sync::Arc;

use httpmock::prelude::*;

use common::website;
use crawlsmith::crawler::{CrawlStatus, crawl_website};
use crawlsmith::providers::MockEmbeddingProvider;
use crawlsmith::settings::Settings;
use crawlsmith::stores::{MemoryVectorStore, VectorStore};

async fn mock_site(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sitemap.xml");
            then.status(200).body(format!(
                "<?xml version=\"1.0\"?>\
                 <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\
                 <url><loc>{base}/hours</loc></url>\
                 <url><loc>{base}/about</loc></url>\
                 </urlset>",
                base = server.base_url()
            ));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/hours");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><head><title>Hours</title></head><body><p>Open 9am-5pm Mon-Fri.</p></body></html>");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/about");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><head><title>About</title></head><body><p>We sell widgets.</p></body></html>");
        })
        .await;
}

fn test_settings() -> Settings {
    Settings {
        crawl_rate_limit: 50,
        ..Settings::default()
    }
}

#[tokio::test]
async fn crawl_fetches_chunks_and_stores() {
    let server = MockServer::start_async().await;
    mock_site(&server).await;

    let store = MemoryVectorStore::new(Arc::new(MockEmbeddingProvider::new()));
    let site = website("Example", &format!("{}/sitemap.xml", server.base_url()));
    let settings = test_settings();

    let outcome = crawl_website(&site, &store, &settings, false).await;

    assert_eq!(outcome.namespace, "example");
    let CrawlStatus::Success {
        pages_crawled,
        chunks_stored,
        errors,
    } = &outcome.status
    else {
        panic!("expected success, got {:?}", outcome.status);
    };
    assert_eq!(*pages_crawled, 2);
    assert!(*chunks_stored >= 2);
    assert!(errors.is_empty());

    assert_eq!(
        store.list_namespaces().await.unwrap(),
        vec!["example".to_string()]
    );
    let matches = store
        .query("when are you open", "example", 5, None)
        .await
        .unwrap();
    assert!(!matches.is_empty());
    assert!(
        matches
            .iter()
            .any(|m| m.metadata["website_name"] == "Example")
    );
}

#[tokio::test]
async fn second_crawl_is_skipped_unless_recrawl() {
    let server = MockServer::start_async().await;
    mock_site(&server).await;

    let store = MemoryVectorStore::new(Arc::new(MockEmbeddingProvider::new()));
    let site = website("Example", &format!("{}/sitemap.xml", server.base_url()));
    let settings = test_settings();

    let first = crawl_website(&site, &store, &settings, false).await;
    let CrawlStatus::Success { chunks_stored, .. } = first.status else {
        panic!("first crawl should succeed");
    };

    let second = crawl_website(&site, &store, &settings, false).await;
    assert_eq!(
        second.status,
        CrawlStatus::Skipped {
            reason: "already_exists".to_string()
        }
    );

    // Recrawl deletes the namespace and repopulates it with the same chunk
    // count for unchanged content.
    let third = crawl_website(&site, &store, &settings, true).await;
    let CrawlStatus::Success {
        chunks_stored: recrawled,
        ..
    } = third.status
    else {
        panic!("recrawl should succeed");
    };
    assert_eq!(recrawled, chunks_stored);

    let matches = store.query("widgets", "example", 50, None).await.unwrap();
    assert_eq!(matches.len().min(50), recrawled.min(50));
}

#[tokio::test]
async fn empty_sitemap_reports_no_pages_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sitemap.xml");
            then.status(200).body(
                "<?xml version=\"1.0\"?>\
                 <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\"></urlset>",
            );
        })
        .await;

    let store = MemoryVectorStore::new(Arc::new(MockEmbeddingProvider::new()));
    let site = website("Empty Site", &format!("{}/sitemap.xml", server.base_url()));

    let outcome = crawl_website(&site, &store, &test_settings(), false).await;
    assert_eq!(outcome.namespace, "empty_site");
    assert_eq!(
        outcome.status,
        CrawlStatus::Error {
            reason: "no_pages_found".to_string()
        }
    );
    assert!(store.list_namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_pages_are_skipped_without_failing_the_site() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/sitemap.xml");
            then.status(200).body(format!(
                "<?xml version=\"1.0\"?>\
                 <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\
                 <url><loc>{base}/good</loc></url>\
                 <url><loc>{base}/binary</loc></url>\
                 <url><loc>{base}/down</loc></url>\
                 </urlset>",
                base = server.base_url()
            ));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/down");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/good");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><body><p>Useful text content.</p></body></html>");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/binary");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("\0\0\0");
        })
        .await;

    let store = MemoryVectorStore::new(Arc::new(MockEmbeddingProvider::new()));
    let site = website("Mixed", &format!("{}/sitemap.xml", server.base_url()));

    let outcome = crawl_website(&site, &store, &test_settings(), false).await;
    let CrawlStatus::Success {
        pages_crawled,
        errors,
        ..
    } = &outcome.status
    else {
        panic!("expected success, got {:?}", outcome.status);
    };
    assert_eq!(*pages_crawled, 3);
    // The binary page is an intentional exclusion; only the hard fetch
    // failure is tallied.
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("/down"));

    let matches = store.query("useful text", "mixed", 10, None).await.unwrap();
    assert!(matches.iter().all(|m| !m.text.contains('\0')));
}
