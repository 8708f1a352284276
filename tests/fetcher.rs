//! Integration tests for the content fetcher against a mock HTTP server.

use httpmock::prelude::*;

use crawlsmith::crawler::ContentFetcher;

fn fetcher() -> ContentFetcher {
    ContentFetcher::new(50, "crawlsmith-tests/0.1").expect("client builds")
}

#[tokio::test]
async fn html_pages_are_fetched_and_converted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/hours");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(
                    "<html><head><title>Hours</title></head>\
                     <body><h1>Opening hours</h1><p>9am-5pm Mon-Fri</p></body></html>",
                );
        })
        .await;

    let url = format!("{}/hours", server.base_url());
    let results = fetcher().fetch_urls(&[url.clone()]).await;

    let result = &results[&url];
    assert!(result.error.is_none());
    assert!(result.content.contains("9am-5pm"));
    assert_eq!(result.title, "Hours");
    assert!(result.content_type.starts_with("text/html"));
}

#[tokio::test]
async fn disallowed_content_types_are_discarded_without_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/banner");
            then.status(200)
                .header("content-type", "image/png")
                .body("not really a png");
        })
        .await;

    let url = format!("{}/banner", server.base_url());
    let results = fetcher().fetch_urls(&[url.clone()]).await;

    let result = &results[&url];
    assert!(result.error.is_none());
    assert!(result.content.is_empty());
    assert_eq!(result.content_type, "image/png");
}

#[tokio::test]
async fn unsupported_content_types_yield_empty_content() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/data");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body("binary");
        })
        .await;

    let url = format!("{}/api/data", server.base_url());
    let results = fetcher().fetch_urls(&[url.clone()]).await;

    let result = &results[&url];
    assert!(result.error.is_none());
    assert!(result.content.is_empty());
}

#[tokio::test]
async fn skipped_extensions_never_touch_the_network() {
    let server = MockServer::start_async().await;
    let image = server
        .mock_async(|when, then| {
            when.method(GET).path("/logo.png");
            then.status(200).header("content-type", "image/png").body("");
        })
        .await;

    let url = format!("{}/logo.png", server.base_url());
    let results = fetcher().fetch_urls(&[url.clone()]).await;

    assert_eq!(image.hits_async().await, 0);
    let result = &results[&url];
    assert!(result.error.is_none());
    assert!(result.content.is_empty());
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let server = MockServer::start_async().await;
    let flaky = server
        .mock_async(|when, then| {
            when.method(GET).path("/down");
            then.status(500);
        })
        .await;

    let url = format!("{}/down", server.base_url());
    let results = fetcher().fetch_urls(&[url.clone()]).await;

    assert_eq!(flaky.hits_async().await, 3);
    let result = &results[&url];
    assert!(result.content.is_empty());
    assert!(result.error.as_deref().unwrap_or("").contains("500"));
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let server = MockServer::start_async().await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        })
        .await;

    let url = format!("{}/gone", server.base_url());
    let results = fetcher().fetch_urls(&[url.clone()]).await;

    assert_eq!(missing.hits_async().await, 1);
    assert!(results[&url].error.is_some());
}
