//! HTTP strategy behavior against live local servers: retry sequencing,
//! status classification, truncation boundaries, and charset handling.

mod common;

use std::time::Instant;

use common::{http_response, test_html, ScriptedServer};
use pagemill::error::ErrorKind;
use pagemill::fetch::{FetchContext, HttpStrategy, Strategy};
use pagemill::utils::constants::MAX_PAGE_SIZE;

#[tokio::test]
async fn two_503s_then_200_succeeds_with_three_attempts() {
    // Response sequencing needs the scripted server; mockito mocks are
    // stateless per route
    let html = test_html("Recovered", "<p>finally up</p>");
    let server = ScriptedServer::start(vec![
        http_response(503, "text/html", b"unavailable"),
        http_response(503, "text/html", b"unavailable"),
        http_response(200, "text/html; charset=utf-8", html.as_bytes()),
    ])
    .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(server.url("/page")).with_max_retries(3);

    let started = Instant::now();
    let result = strategy.fetch(&ctx).await;
    let elapsed = started.elapsed().as_secs_f64();

    assert!(result.success, "error: {:?}", result.error_message);
    assert_eq!(result.attempts, 3);
    assert!(result.html.unwrap().contains("Recovered"));
    // Backoff sleeps of ~1s and ~2s preceded attempts two and three
    assert!(elapsed >= 2.9, "expected backoff sleeps, elapsed {elapsed:.2}s");
}

#[tokio::test]
async fn not_found_fails_after_a_single_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("gone")
        .expect(1)
        .create_async()
        .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(format!("{}/missing", server.url())).with_max_retries(3);

    let result = strategy.fetch(&ctx).await;
    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.error_kind, Some(ErrorKind::Permanent));
    mock.assert_async().await;
}

#[tokio::test]
async fn forbidden_classifies_anti_bot_and_suggests_headless() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/walled")
        .with_status(403)
        .with_body("denied")
        .expect(1)
        .create_async()
        .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(format!("{}/walled", server.url())).with_max_retries(3);

    let result = strategy.fetch(&ctx).await;
    assert!(!result.success);
    assert_eq!(result.attempts, 1, "anti-bot must not burn the retry budget");
    assert_eq!(result.error_kind, Some(ErrorKind::AntiBot));
    assert_eq!(
        result.classification.and_then(|c| c.suggested_fallback),
        Some(Strategy::Headless)
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn anti_bot_interstitial_detected_in_200_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/challenge")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<html><body>Checking your browser before accessing</body></html>")
        .create_async()
        .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(format!("{}/challenge", server.url())).with_max_retries(0);

    let result = strategy.fetch(&ctx).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::AntiBot));
}

#[tokio::test]
async fn gb2312_page_decodes_to_han_text() {
    let (encoded, _, _) = encoding_rs::GBK.encode(
        "<html><head><meta charset=\"gb2312\"></head><body><p>十八届中央政治局</p></body></html>",
    );
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/legacy")
        .with_status(200)
        .with_header("content-type", "text/html; charset=gb2312")
        .with_body(encoded.as_ref())
        .create_async()
        .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(format!("{}/legacy", server.url())).with_max_retries(0);

    let result = strategy.fetch(&ctx).await;
    assert!(result.success);
    let html = result.html.unwrap();
    assert!(html.contains("十八届中央政治局"));
    assert!(!html.contains('\u{FFFD}'));
    assert_eq!(result.encoding.as_deref(), Some("gb2312"));
}

#[tokio::test]
async fn body_at_exactly_max_page_size_is_complete() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/exact")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("a".repeat(MAX_PAGE_SIZE))
        .create_async()
        .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(format!("{}/exact", server.url())).with_max_retries(0);

    let result = strategy.fetch(&ctx).await;
    assert!(result.success);
    assert!(!result.truncated);
    assert_eq!(result.html.unwrap().len(), MAX_PAGE_SIZE);
}

#[tokio::test]
async fn body_one_byte_over_is_truncated_and_flagged() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/over")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("a".repeat(MAX_PAGE_SIZE + 1))
        .create_async()
        .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(format!("{}/over", server.url())).with_max_retries(0);

    let result = strategy.fetch(&ctx).await;
    assert!(result.success);
    assert!(result.truncated);
    assert_eq!(result.html.unwrap().len(), MAX_PAGE_SIZE);
}

#[tokio::test]
async fn final_url_reflects_redirects() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/start")
        .with_status(301)
        .with_header("location", "/destination")
        .create_async()
        .await;
    server
        .mock("GET", "/destination")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(test_html("Destination", "<p>landed</p>"))
        .create_async()
        .await;

    let strategy = HttpStrategy::new().unwrap();
    let ctx = FetchContext::new(format!("{}/start", server.url())).with_max_retries(0);

    let result = strategy.fetch(&ctx).await;
    assert!(result.success);
    assert!(result.final_url.unwrap().ends_with("/destination"));
}
