//! Router tests over in-process clients; Firestore is served by wiremock.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ottcms_api::auth::AdminAuth;
use ottcms_api::{create_router, ApiConfig, AppState, Clients};
use ottcms_firestore::{FirestoreClient, FirestoreConfig, RetryConfig, TokenCache};
use ottcms_providers::{DriveClient, DriveConfig, HlsTranscoder, MediaConvertClient, MediaConvertConfig, TranscodeConfig};
use ottcms_queue::{JobQueue, QueueConfig};
use ottcms_storage::{S3Client, S3Config};

const JWT_SECRET: &str = "router-test-secret-router-test-secret";
const WEBHOOK_SECRET: &str = "hook-secret";

fn config() -> ApiConfig {
    ApiConfig {
        admin_jwt_secret: JWT_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        output_base: "s3://ott-output".to_string(),
        rate_limit_rps: 1000,
        rate_limit_burst: 1000,
        ..ApiConfig::default()
    }
}

async fn app(firestore: &MockServer) -> Router {
    let storage = S3Client::new(S3Config {
        endpoint_url: Some("http://127.0.0.1:9".to_string()),
        access_key_id: Some("test".to_string()),
        secret_access_key: Some("test".to_string()),
        bucket_name: "raw".to_string(),
        region: "us-east-1".to_string(),
        force_path_style: true,
    })
    .await
    .unwrap();

    let firestore = FirestoreClient::with_token_cache(
        FirestoreConfig {
            project_id: "test-project".to_string(),
            database_id: "(default)".to_string(),
            endpoint: Some(firestore.uri()),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 0,
                base_delay_ms: 10,
                max_delay_ms: 10,
            },
        },
        TokenCache::fixed("test-token"),
    )
    .unwrap();

    let queue = JobQueue::new(QueueConfig {
        redis_url: "redis://127.0.0.1:1".to_string(),
        ..QueueConfig::default()
    })
    .unwrap();

    let hls = HlsTranscoder::new(TranscodeConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        api_key: "key".to_string(),
        h264_template: "h264".to_string(),
        h265_template: "h265".to_string(),
        timeout: Duration::from_secs(1),
    })
    .unwrap();

    let media_convert = MediaConvertClient::new(MediaConvertConfig {
        region: "us-east-1".to_string(),
        role_arn: "arn:aws:iam::000000000000:role/mc".to_string(),
        queue_arn: None,
        endpoint_url: Some("http://127.0.0.1:9".to_string()),
        max_bitrate: 5_000_000,
    })
    .await;

    let drive = DriveClient::new(DriveConfig {
        api_base: "http://127.0.0.1:9".to_string(),
        page_size: 100,
        max_depth: 3,
        timeout: Duration::from_secs(1),
        access_token: Some("drive-token".to_string()),
    })
    .await
    .unwrap();

    let clients = Clients {
        storage,
        firestore,
        queue,
        hls,
        media_convert,
        drive,
    };
    create_router(AppState::with_clients(config(), clients), None)
}

fn bearer() -> String {
    let token = AdminAuth::new(JWT_SECRET).issue_token("ops@example.com", 300).unwrap();
    format!("Bearer {token}")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let server = MockServer::start().await;
    let response = app(&server)
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn api_requires_admin_token() {
    let server = MockServer::start().await;
    let response = app(&server)
        .await
        .oneshot(Request::builder().uri("/api/media").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn invalid_plan_is_rejected_before_storage() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/plans")
        .header("Authorization", bearer())
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "name": "Premium",
                "currency": "INR",
                "actualPrice": 49900,
                "payingPrice": 59900,
                "durationDays": 30
            })
            .to_string(),
        ))
        .unwrap();

    let response = app(&server).await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_PLAN_DATA");
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn missing_media_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/raw_media/m-404$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "status": "NOT_FOUND", "message": "not found" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .uri("/api/media/m-404")
        .header("Authorization", bearer())
        .body(Body::empty())
        .unwrap();
    let response = app(&server).await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unsafe_path_ids_never_reach_storage() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .uri("/api/media/bad%2E%2Eid")
        .header("Authorization", bearer())
        .body(Body::empty())
        .unwrap();
    let response = app(&server).await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn frames_hook_checks_webhook_secret() {
    let server = MockServer::start().await;
    let payload = json!({ "status": "failed", "error": "decoder crashed" }).to_string();

    let wrong = Request::builder()
        .method("POST")
        .uri("/hooks/poster-projects/p1/frames")
        .header("X-Webhook-Secret", "not-the-secret")
        .header("Content-Type", "application/json")
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app(&server).await.oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // An admin token is not a substitute for the webhook secret.
    let admin = Request::builder()
        .method("POST")
        .uri("/hooks/poster-projects/p1/frames")
        .header("Authorization", bearer())
        .header("Content-Type", "application/json")
        .body(Body::from(payload))
        .unwrap();
    let response = app(&server).await.oneshot(admin).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn frames_hook_for_unknown_project_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/poster_projects/p1$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/hooks/poster-projects/p1/frames")
        .header("X-Webhook-Secret", WEBHOOK_SECRET)
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "status": "completed", "frames": [] }).to_string()))
        .unwrap();
    let response = app(&server).await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drive_links_are_validated() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/drive/resolve")
        .header("Authorization", bearer())
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "links": ["https://example.com/movie.mp4"] }).to_string()))
        .unwrap();
    let response = app(&server).await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_DRIVE_LINK");
}
