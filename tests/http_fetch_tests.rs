//! Integration tests for the HTTP page fetcher
//!
//! These tests use wiremock to stand up a paginated JSON API and drive the
//! fetcher directly and through a complete fixed run.

use pagewise::config::{ApiConfig, UserAgentConfig};
use pagewise::fetch::{FetchError, HttpPageFetcher, PageFetcher, PageRequest};
use pagewise::scheduler::{run_fixed, RunOptions};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        client_name: "TestClient".to_string(),
        client_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn create_api_config(base_url: &str, items_field: Option<&str>) -> ApiConfig {
    ApiConfig {
        base_url: format!("{}/items", base_url),
        page_param: "page".to_string(),
        items_field: items_field.map(str::to_string),
        timeout_ms: 2000,
        params: BTreeMap::new(),
    }
}

fn request(page_number: u32) -> PageRequest {
    PageRequest {
        page_number,
        params: Arc::new(BTreeMap::new()),
    }
}

/// Mounts `total_pages` pages of `per_page` items under `/items`, except `skip`
async fn mount_pages(server: &MockServer, total_pages: u32, per_page: usize, skip: &[u32]) {
    for page in (1..=total_pages).filter(|page| !skip.contains(page)) {
        let items: Vec<_> = (0..per_page).map(|i| json!({ "id": i })).collect();
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": items })))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_fetch_counts_items_and_sends_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("page", "3"))
        .and(query_param("per_page", "25"))
        .and(header_regex("user-agent", "^TestClient/1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3, 4])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher =
        HttpPageFetcher::new(&create_api_config(&mock_server.uri(), None), &create_user_agent())
            .expect("Failed to build fetcher");

    let mut params = BTreeMap::new();
    params.insert("per_page".to_string(), "25".to_string());
    let items = fetcher
        .fetch(&PageRequest {
            page_number: 3,
            params: Arc::new(params),
        })
        .await
        .expect("Fetch should succeed");

    assert_eq!(items, 4);
}

#[tokio::test]
async fn test_rate_limit_and_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetcher =
        HttpPageFetcher::new(&create_api_config(&mock_server.uri(), None), &create_user_agent())
            .expect("Failed to build fetcher");

    let limited = fetcher.fetch(&request(1)).await.unwrap_err();
    assert!(matches!(limited, FetchError::RateLimited { page: 1 }));
    assert!(limited.is_backpressure());

    let failed = fetcher.fetch(&request(2)).await.unwrap_err();
    assert!(matches!(
        failed,
        FetchError::Status {
            page: 2,
            status: 500
        }
    ));
}

#[tokio::test]
async fn test_undecodable_body_is_a_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": "none" })))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(
        &create_api_config(&mock_server.uri(), Some("results")),
        &create_user_agent(),
    )
    .expect("Failed to build fetcher");

    assert!(matches!(
        fetcher.fetch(&request(1)).await,
        Err(FetchError::Decode { page: 1, .. })
    ));
    assert!(matches!(
        fetcher.fetch(&request(2)).await,
        Err(FetchError::Decode { page: 2, .. })
    ));
}

#[tokio::test]
async fn test_fixed_run_over_http() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server, 12, 5, &[9]).await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("page", "9"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let fetcher = HttpPageFetcher::new(
        &create_api_config(&mock_server.uri(), Some("results")),
        &create_user_agent(),
    )
    .expect("Failed to build fetcher");

    let report = run_fixed(12, 4, &fetcher, &RunOptions::default())
        .await
        .expect("Run should start");

    assert_eq!(report.rounds, 3);
    assert_eq!(report.completed_pages(), 12);
    assert_eq!(report.failed_pages(), vec![9]);
    assert_eq!(report.total_items, 11 * 5);

    let pages: Vec<u32> = report.results.iter().map(|r| r.page_number).collect();
    assert_eq!(pages, (1..=12).collect::<Vec<_>>());

    let requests = mock_server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 12);
}
