//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use sitechunk::config::{ScraperConfig, SplitLength};
use sitechunk::output::{MemorySink, RecordSink};
use sitechunk::{crawl, ConfigError, Coordinator, CrawlError, RunState};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration seeded at the mock server's root
fn create_test_config(server: &MockServer) -> ScraperConfig {
    let mut config = ScraperConfig::for_domain(format!("{}/", server.uri()));
    // The mock server listens on loopback
    config.filter.block_private_hosts = false;
    config.crawler.delay_between_requests = 0.0;
    config.http.max_retries = 0;
    config.http.base_delay = 0.01;
    config.http.timeout = 5.0;
    config
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(body))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_with_depth_limit_and_excluded_link() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        r#"<p>Home page</p><a href="/x">X</a><a href="/y">Y</a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/x", r#"<p>Page x</p><a href="/z">Z</a>"#, 1).await;
    // Excluded by keyword
    mount_page(&mock_server, "/y", "<p>Page y</p>", 0).await;
    // Beyond max depth
    mount_page(&mock_server, "/z", "<p>Page z</p>", 0).await;

    let mut config = create_test_config(&mock_server);
    config.crawler.max_depth = Some(1);
    config.filter.exclude_keywords = vec!["y".to_string()];

    let sink = Arc::new(MemorySink::new());
    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .with_sink(sink.clone())
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.max_depth_reached, 1);
    // Two links on the seed page, one filtered; links on /x are not followed
    assert_eq!(report.links_filtered, 1);
    assert_eq!(report.urls_enqueued, 2);

    let texts: Vec<String> = sink.records().into_iter().map(|r| r.text).collect();
    assert!(texts.iter().any(|t| t.contains("Home page")));
    assert!(texts.iter().any(|t| t.contains("Page x")));
    assert!(!texts.iter().any(|t| t.contains("Page y")));
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_failures() {
    let mock_server = MockServer::start().await;

    let links: String = (1..=12)
        .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
        .collect();
    mount_page(&mock_server, "/", &format!("<p>Index</p>{}", links), 1).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/p\d+$"))
        .respond_with(ResponseTemplate::new(500))
        .expect(10)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server);
    config.crawler.concurrent_requests = 1;
    config.crawler.connections_per_host = 1;
    config.circuit_breaker.threshold = 10;
    config.circuit_breaker.failure_rate = 1.0;
    config.circuit_breaker.min_requests = 10;

    let sink = Arc::new(MemorySink::new());
    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .with_sink(sink.clone())
        .run()
        .await
        .expect("Circuit open is not a fatal error");

    assert_eq!(report.state, RunState::CircuitOpen);
    assert_eq!(report.state.exit_code(), 3);
    assert!(report.breaker.is_open());
    assert_eq!(report.breaker.total_requests, 11);
    assert_eq!(report.breaker.total_failures, 10);
    assert_eq!(report.pages_fetched, 1);
    assert!(report.pages_failed >= 10);

    // Records from the seed page were still written
    assert_eq!(sink.records_written(), 1);
}

#[tokio::test]
async fn test_duplicate_chunks_across_pages_written_once() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        r#"<p>Shared introduction</p><a href="/a"></a><a href="/b"></a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/a", "<p>Shared introduction</p>", 1).await;
    mount_page(&mock_server, "/b", r#"<p>Something else</p><a href="/">Home</a>"#, 1).await;

    let mut config = create_test_config(&mock_server);
    config.crawler.max_depth = Some(2);
    config.content.split_length = SplitLength::Unlimited;

    let sink = Arc::new(MemorySink::new());
    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .with_sink(sink.clone())
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.duplicate_chunks, 1);

    let records = sink.records();
    let shared: Vec<_> = records
        .iter()
        .filter(|r| r.text == "Shared introduction")
        .collect();
    assert_eq!(shared.len(), 1);
    assert!(shared[0].url.ends_with('/'));
    assert!(records.iter().any(|r| r.text.starts_with("Something else")));
    assert_eq!(report.records_written, records.len() as u64);
}

#[tokio::test]
async fn test_formula_text_is_neutralized_in_csv() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", "<p>=1+1</p>", 1).await;

    let out_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&mock_server);
    config.crawler.max_depth = Some(0);
    config.output.root = Some(out_dir.path().to_path_buf());
    config.output.path = Some("records/out.csv".into());

    let report = crawl(config).await.expect("Crawl failed");
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.records_written, 1);

    let output_path = out_dir.path().join("records/out.csv");
    assert_eq!(report.output_path.as_deref(), Some(output_path.as_path()));

    let contents = std::fs::read_to_string(&output_path).expect("Failed to read output");
    let contents = contents.trim_start_matches('\u{feff}');
    let mut reader = csv::Reader::from_reader(contents.as_bytes());
    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("Invalid CSV");

    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "'=1+1");
    assert_eq!(&rows[0][2], "1");
    assert!(!contents.lines().any(|line| line.starts_with("=1+1")));
}

#[tokio::test]
async fn test_url_discovered_twice_fetched_once() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        r#"<p>Start</p><a href="/a">A</a><a href="/a#top">A again</a><a href="/b">B</a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/a", r#"<p>Alpha</p><a href="/b">B</a><a href="/">Home</a>"#, 1).await;
    mount_page(&mock_server, "/b", r#"<p>Beta</p><a href="/a">A</a>"#, 1).await;

    let mut config = create_test_config(&mock_server);
    config.crawler.max_depth = None;

    let sink = Arc::new(MemorySink::new());
    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .with_sink(sink)
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.urls_enqueued, 3);
}

#[tokio::test]
async fn test_transient_failure_recovered_by_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/", "<p>Recovered</p>", 1).await;

    let mut config = create_test_config(&mock_server);
    config.http.max_retries = 2;

    let sink = Arc::new(MemorySink::new());
    let report = Coordinator::new(config)
        .expect("Failed to create coordinator")
        .with_sink(sink.clone())
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.breaker.total_requests, 2);
    assert_eq!(report.breaker.total_failures, 1);
    assert_eq!(sink.records()[0].text, "Recovered");
}

#[tokio::test]
async fn test_private_seed_is_rejected() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", "<p>Secret</p>", 0).await;

    let mut config = create_test_config(&mock_server);
    config.filter.block_private_hosts = true;

    // Literal loopback seeds are refused before any request is made
    let result = Coordinator::new(config);
    assert!(matches!(
        result,
        Err(CrawlError::Config(ConfigError::ForbiddenSeed(_)))
    ));
}
