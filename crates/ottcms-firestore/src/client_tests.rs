//! Tests for Firestore client functionality.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ottcms_models::PageParams;

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::FirestoreError;
use crate::repository::Collection;
use crate::retry::RetryConfig;
use crate::token_cache::TokenCache;

// =============================================================================
// Test Helpers
// =============================================================================

const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";

fn test_config(endpoint: Option<String>) -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        endpoint,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        },
    }
}

fn test_client(server: &MockServer) -> FirestoreClient {
    FirestoreClient::with_token_cache(test_config(Some(server.uri())), TokenCache::fixed("test-token")).unwrap()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Item {
    id: String,
    label: String,
    created_at: DateTime<Utc>,
}

fn item_doc(id: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/test-project/databases/(default)/documents/items/{id}"),
        "fields": {
            "id": { "stringValue": id },
            "label": { "stringValue": format!("label {id}") },
            "created_at": { "timestampValue": "2024-03-01T10:00:00Z" }
        }
    })
}

// =============================================================================
// Error Type Tests
// =============================================================================

#[test]
fn test_error_from_http_status() {
    assert!(matches!(
        FirestoreError::from_http_status(429, "rate limited"),
        FirestoreError::RateLimited(_)
    ));
    assert!(matches!(
        FirestoreError::from_http_status(503, "unavailable"),
        FirestoreError::ServerError(503, _)
    ));
    assert!(matches!(
        FirestoreError::from_http_status(409, "conflict"),
        FirestoreError::AlreadyExists(_)
    ));
    assert!(matches!(
        FirestoreError::from_http_status(400, "bad request"),
        FirestoreError::RequestFailed(_)
    ));
}

#[test]
fn test_error_retryability() {
    assert!(FirestoreError::from_http_status(500, "internal").is_retryable());
    assert!(FirestoreError::from_http_status(429, "slow down").is_retryable());
    assert!(!FirestoreError::from_http_status(400, "bad request").is_retryable());
    assert!(!FirestoreError::from_http_status(404, "missing").is_retryable());
    assert!(!FirestoreError::from_http_status(401, "unauthenticated").is_retryable());
}

#[test]
fn test_error_http_status_getter() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(FirestoreError::ServerError(502, "bad gateway".into()).http_status(), Some(502));
    assert_eq!(FirestoreError::NotFound("doc".into()).http_status(), Some(404));
    assert_eq!(FirestoreError::RateLimited(5000).retry_after_ms(), Some(5000));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
#[serial]
fn test_config_validates_empty_project_id() {
    std::env::set_var("GCP_PROJECT_ID", "");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    assert!(FirestoreConfig::from_env().is_err());
}

#[test]
#[serial]
fn test_config_prefers_gcp_project_id() {
    std::env::set_var("GCP_PROJECT_ID", "gcp-project");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "gcp-project");
    std::env::remove_var("FIREBASE_PROJECT_ID");
}

#[test]
#[serial]
fn test_config_reads_emulator_host() {
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.endpoint.as_deref(), Some("http://localhost:8080"));
    std::env::remove_var("FIRESTORE_EMULATOR_HOST");
}

#[test]
#[serial]
fn test_config_handles_invalid_env_values() {
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "50");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.retry.base_delay_ms, 50);
    std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
    std::env::remove_var("FIRESTORE_RETRY_BASE_MS");
}

// =============================================================================
// HTTP Tests
// =============================================================================

#[tokio::test]
async fn test_get_document_missing_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/items/nope")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"code": 404}})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.get_document("items", "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_collection_get_decodes_entity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/items/a1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_doc("a1")))
        .mount(&server)
        .await;

    let items: Collection<Item> = Collection::new(test_client(&server), "items");
    let item = items.get("a1").await.unwrap().unwrap();
    assert_eq!(item.label, "label a1");
}

#[tokio::test]
async fn test_create_conflict_maps_to_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}/items")))
        .and(query_param("documentId", "dup"))
        .respond_with(ResponseTemplate::new(409).set_body_string("ALREADY_EXISTS"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .create_document("items", "dup", Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/items/a1")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/items/a1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_doc("a1")))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.get_document("items", "a1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_expired_token_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/items/a1")))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":{"status":"ACCESS_TOKEN_EXPIRED"}}"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/items/a1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_doc("a1")))
        .mount(&server)
        .await;

    let client = test_client(&server);
    assert!(client.get_document("items", "a1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_page_overfetches_and_reports_next_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}:runQuery")))
        .and(body_partial_json(json!({
            "structuredQuery": { "from": [{ "collectionId": "items" }], "limit": 3, "offset": 2 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "document": item_doc("c"), "readTime": "2024-03-01T10:00:00Z" },
            { "document": item_doc("b"), "readTime": "2024-03-01T10:00:00Z" },
            { "document": item_doc("a"), "readTime": "2024-03-01T10:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let items: Collection<Item> = Collection::new(test_client(&server), "items");
    let page = items.page(Vec::new(), &PageParams::new(2, 2)).await.unwrap();
    assert_eq!(page.data.len(), 2);
    assert!(page.next_page_available);
    assert_eq!(page.page, 2);
}

#[tokio::test]
async fn test_nested_collection_queries_under_parent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}/projects/p1:runQuery")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "readTime": "2024-03-01T10:00:00Z" }])))
        .expect(1)
        .mount(&server)
        .await;

    let items: Collection<Item> = Collection::new(test_client(&server), "projects/p1/items");
    assert!(items.run(items.query()).await.unwrap().is_empty());
}
