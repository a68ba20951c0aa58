//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! full crawl cycle end-to-end: fetching, link expansion, extraction, and
//! result delivery.

use fathom::config::{ContentFilterKind, CrawlConfig, DispatcherKind, ThresholdKind};
use fathom::output::ErrorKind;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str) -> CrawlConfig {
    let mut config = CrawlConfig::new(format!("{}/", base_url));
    config.max_depth = 2;
    config.dispatcher.kind = DispatcherKind::Fixed;
    config.dispatcher.max_concurrent = 4;
    config
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <p>Welcome to the landing page.</p>
            <a href="{base}/page1">Page 1</a>
            <a href="{base}/page2">Page 2</a>
            </body></html>"#
        ),
    )
    .await;

    mount_page(
        &server,
        "/page1",
        "<html><head><title>Page 1</title></head><body><p>Content 1</p></body></html>".to_string(),
    )
    .await;

    mount_page(
        &server,
        "/page2",
        "<html><head><title>Page 2</title></head><body><p>Content 2</p></body></html>".to_string(),
    )
    .await;

    let config = create_test_config(&base);
    let report = fathom::crawl(config).await.unwrap();

    assert_eq!(report.buckets.total(), 3);
    assert_eq!(report.buckets.get(0).unwrap().len(), 1);
    assert_eq!(report.buckets.get(1).unwrap().len(), 2);
    assert_eq!(report.summary.succeeded, 3);
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test]
async fn test_dead_link_is_local_failure() {
    let server = MockServer::start().await;
    let base = server.uri();

    // /missing is not mounted: wiremock answers 404
    mount_page(
        &server,
        "/",
        format!(
            r#"<body><a href="{base}/ok">ok</a><a href="{base}/missing">gone</a></body>"#
        ),
    )
    .await;
    mount_page(&server, "/ok", "<body><p>fine</p></body>".to_string()).await;

    let config = create_test_config(&base);
    let report = fathom::crawl(config).await.unwrap();

    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 1);

    let failed: Vec<_> = report
        .buckets
        .get(1)
        .unwrap()
        .iter()
        .filter(|o| !o.success)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(matches!(
        failed[0].error_kind,
        Some(ErrorKind::FetchFailure(_))
    ));
}

#[tokio::test]
async fn test_markdown_extraction_end_to_end() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        "<html><head><title>Doc</title></head><body>\
         <h1>Guide</h1><p>A reasonably long paragraph of actual content \
         that should clear any word threshold in use here.</p></body></html>"
            .to_string(),
    )
    .await;

    let mut config = create_test_config(&base);
    config.max_depth = 0;
    config.output.save_markdown = true;

    let report = fathom::crawl(config).await.unwrap();

    let root = &report.buckets.get(0).unwrap()[0];
    let raw = root.raw_markdown.as_deref().unwrap();
    assert!(raw.contains("# Guide"));
    assert!(raw.contains("reasonably long paragraph"));
    // No content filter configured: no fit rendering
    assert!(root.fit_markdown.is_none());
}

#[tokio::test]
async fn test_pruning_filter_end_to_end() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        "<body><p>short one</p></body>".to_string(),
    )
    .await;

    let mut config = create_test_config(&base);
    config.max_depth = 0;
    config.output.save_markdown = true;
    config.content_filter = ContentFilterKind::Pruning;
    config.pruning.threshold = 0.45;
    config.pruning.threshold_type = ThresholdKind::Fixed;
    config.pruning.min_word_threshold = 50;

    let report = fathom::crawl(config).await.unwrap();

    // The only segment has 2 words: filtered rendering is empty while the
    // raw rendering keeps the text
    let root = &report.buckets.get(0).unwrap()[0];
    assert_eq!(root.fit_markdown.as_deref(), Some(""));
    assert!(root.raw_markdown.as_deref().unwrap().contains("short one"));
}

#[tokio::test]
async fn test_streaming_over_http() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(r#"<body><a href="{base}/a">a</a><a href="{base}/b">b</a></body>"#),
    )
    .await;
    mount_page(&server, "/a", "<body><p>a</p></body>".to_string()).await;
    mount_page(&server, "/b", "<body><p>b</p></body>".to_string()).await;

    let config = create_test_config(&base);
    let mut stream = fathom::crawl_stream(config).await.unwrap();

    let mut count = 0;
    while let Some(outcome) = stream.next().await {
        assert!(outcome.success);
        count += 1;
    }
    assert_eq!(count, 3);

    let summary = stream.finish().await.unwrap();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.pages_per_depth.get(&1), Some(&2));
}

#[tokio::test]
async fn test_throttling_server_exhausts_retry_budget() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let mut config = create_test_config(&base);
    config.rate_limiter.enabled = true;
    config.rate_limiter.base_delay_ms = (1, 2);
    config.rate_limiter.max_delay_ms = 20;
    config.rate_limiter.max_retries = 1;

    let report = fathom::crawl(config).await.unwrap();

    assert_eq!(report.summary.succeeded, 0);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(
        report.buckets.get(0).unwrap()[0].error_kind,
        Some(ErrorKind::ThrottleExhausted)
    );

    // Initial attempt plus one retry
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_max_pages_over_http() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(
            r#"<body><a href="{base}/p1">1</a><a href="{base}/p2">2</a>
            <a href="{base}/p3">3</a><a href="{base}/p4">4</a>
            <a href="{base}/p5">5</a></body>"#
        ),
    )
    .await;

    let mut config = create_test_config(&base);
    config.max_pages = Some(1);

    let report = fathom::crawl(config).await.unwrap();

    assert_eq!(report.buckets.total(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
