//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test the full
//! crawl cycle end-to-end with the real HTTP client and an SQLite file.
//!
//! Targets use the mock server's `127.0.0.1:PORT` address as their domain,
//! so the `www.` and `https://` variants fail and the plain `http://` variant
//! reaches the server.

use std::path::Path;
use tempfile::TempDir;
use tessera::config::Config;
use tessera::crawler::{crawl_single, run_crawl, Outcome, RunOptions};
use tessera::state::{ErrorKind, TargetStatus};
use tessera::storage::{NewTarget, RunStatus, SqliteStorage, TargetStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPANY_PAGE: &str = r#"
<html>
<head><title>Rossi Costruzioni</title><script>var x = 1;</script></head>
<body>
    <nav><a href="/chi-siamo">Chi siamo</a></nav>
    <main>
        <h1>Rossi Costruzioni Srl</h1>
        <p>Dal 1962 costruiamo edifici residenziali e industriali in Emilia-Romagna.</p>
    </main>
    <footer>P.IVA 01234567890</footer>
</body>
</html>
"#;

/// Creates a test configuration pointing at a database in `dir`
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.concurrency = 4;
    config.crawler.request_timeout_secs = 5;
    config.crawler.connect_timeout_secs = 2;
    config.persistence.flush_threshold = 2;
    config.storage.database_path = dir
        .path()
        .join("tessera.db")
        .to_string_lossy()
        .into_owned();
    config
}

/// Inserts targets into the configured database and returns their IDs
fn seed_targets(config: &Config, targets: &[NewTarget]) -> Vec<i64> {
    let mut storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .expect("Failed to open database");
    targets
        .iter()
        .map(|t| storage.insert_target(t).expect("Failed to insert target"))
        .collect()
}

fn open(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.storage.database_path)).expect("Failed to open database")
}

async fn mount_page(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_full_crawl_single_target() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 200, COMPANY_PAGE).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let domain = mock_server.address().to_string();
    let ids = seed_targets(&config, &[NewTarget::with_domain(&domain).country("IT")]);

    let summary = run_crawl(config.clone(), RunOptions::default())
        .await
        .expect("Crawl failed");

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.errored, 0);
    assert!(!summary.cancelled);

    let storage = open(&config);
    let target = storage.get_target(ids[0]).unwrap();
    assert_eq!(target.status, TargetStatus::Success);
    assert!(target.last_attempt_at.is_some());

    let text = storage.get_text(ids[0]).unwrap().expect("Text should be stored");
    assert!(text.text_content.contains("Rossi Costruzioni Srl"));
    assert!(text.text_content.contains("Dal 1962 costruiamo"));
    assert!(!text.text_content.contains("var x"));
    assert!(!text.text_content.contains("Chi siamo"));
    assert!(!text.text_content.contains("P.IVA"));
    assert_eq!(text.cleaned_content.as_deref(), Some(text.text_content.as_str()));

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.succeeded, 1);
}

#[tokio::test]
async fn test_server_error_on_last_variant_is_http_5xx() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 503, "Service Unavailable").await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let domain = mock_server.address().to_string();
    let ids = seed_targets(&config, &[NewTarget::with_domain(&domain)]);

    let summary = run_crawl(config.clone(), RunOptions::default())
        .await
        .expect("Crawl failed");

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.errored, 1);

    let storage = open(&config);
    let target = storage.get_target(ids[0]).unwrap();
    assert_eq!(target.status, TargetStatus::Error);
    assert_eq!(target.error_kind, Some(ErrorKind::Http5xx));
    assert_eq!(target.error_detail.as_deref(), Some("HTTP 503"));
    assert!(storage.get_text(ids[0]).unwrap().is_none());
}

#[tokio::test]
async fn test_short_page_is_parse_error() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        200,
        "<html><body><h1>Hi</h1><footer>x</footer></body></html>",
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let domain = mock_server.address().to_string();
    let ids = seed_targets(&config, &[NewTarget::with_domain(&domain)]);

    run_crawl(config.clone(), RunOptions::default())
        .await
        .expect("Crawl failed");

    let target = open(&config).get_target(ids[0]).unwrap();
    assert_eq!(target.error_kind, Some(ErrorKind::ParseError));
}

#[tokio::test]
async fn test_rerun_makes_no_requests() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 200, COMPANY_PAGE).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let domain = mock_server.address().to_string();
    seed_targets(&config, &[NewTarget::with_domain(&domain)]);

    run_crawl(config.clone(), RunOptions::default())
        .await
        .expect("First crawl failed");
    let requests_after_first = request_count(&mock_server).await;
    assert!(requests_after_first >= 1);

    let second = run_crawl(config.clone(), RunOptions::default())
        .await
        .expect("Second crawl failed");

    assert_eq!(second.processed(), 0);
    assert_eq!(second.run_id, None);
    assert_eq!(request_count(&mock_server).await, requests_after_first);
    assert_eq!(open(&config).count_texts().unwrap(), 1);
}

#[tokio::test]
async fn test_missing_domain_is_no_url_without_network() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let ids = seed_targets(&config, &[NewTarget::default()]);

    let summary = run_crawl(config.clone(), RunOptions::default())
        .await
        .expect("Crawl failed");

    assert_eq!(summary.errored, 1);
    let target = open(&config).get_target(ids[0]).unwrap();
    assert_eq!(target.error_kind, Some(ErrorKind::NoUrl));
}

#[tokio::test]
async fn test_crawl_single_target_by_id() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 200, COMPANY_PAGE).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let domain = mock_server.address().to_string();
    let ids = seed_targets(
        &config,
        &[
            NewTarget::with_domain(&domain),
            NewTarget::with_domain(&domain),
        ],
    );

    let outcome = crawl_single(config.clone(), ids[1])
        .await
        .expect("Single crawl failed");

    assert!(matches!(outcome, Outcome::Success { target_id, .. } if target_id == ids[1]));

    let storage = open(&config);
    assert_eq!(
        storage.get_target(ids[0]).unwrap().status,
        TargetStatus::Pending
    );
    assert_eq!(
        storage.get_target(ids[1]).unwrap().status,
        TargetStatus::Success
    );
}

#[tokio::test]
async fn test_region_filter_limits_run() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 200, COMPANY_PAGE).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let domain = mock_server.address().to_string();
    let ids = seed_targets(
        &config,
        &[
            NewTarget::with_domain(&domain).country("IT"),
            NewTarget::with_domain(&domain).country("DE"),
        ],
    );

    let options = RunOptions {
        region: Some("de".to_string()),
        ..RunOptions::default()
    };
    let summary = run_crawl(config.clone(), options)
        .await
        .expect("Crawl failed");

    assert_eq!(summary.succeeded, 1);
    let storage = open(&config);
    assert_eq!(
        storage.get_target(ids[0]).unwrap().status,
        TargetStatus::Pending
    );
    assert_eq!(
        storage.get_target(ids[1]).unwrap().status,
        TargetStatus::Success
    );
}
