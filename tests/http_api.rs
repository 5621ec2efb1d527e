//! HTTP surface tests: the router is driven with `oneshot`, upstreams are mocked.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use pixelrelay::server::{build_router, AppState};
use pixelrelay::{ImageApi, RelayConfig};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Router with every key set and every provider pointed at `server`.
fn app(server: &MockServer) -> Router {
    let mut config = RelayConfig::new();
    for api in ImageApi::ALL {
        config = config
            .with_api_key(api, format!("{}-key", api))
            .with_base_url(api, server.uri());
    }
    build_router(AppState::from_config(&config))
}

fn app_without_keys(server: &MockServer) -> Router {
    let mut config = RelayConfig::new();
    for api in ImageApi::ALL {
        config = config.with_base_url(api, server.uri());
    }
    build_router(AppState::from_config(&config))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn options_is_answered_with_cors_headers() {
    let server = MockServer::start().await;

    for uri in ["/generate", "/status", "/api/generate", "/api/status"] {
        let response = app(&server)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "OPTIONS {}", uri);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(
            headers["access-control-allow-methods"],
            "GET,OPTIONS,PATCH,DELETE,POST,PUT"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn generate_rejects_other_methods() {
    let server = MockServer::start().await;

    let response = app(&server).oneshot(get("/generate")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let body = read_json(response).await;
    assert_eq!(body, json!({ "success": false, "error": "Method not allowed" }));
}

#[tokio::test]
async fn status_rejects_other_methods() {
    let server = MockServer::start().await;

    let response = app(&server)
        .oneshot(post_json("/status", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = read_json(response).await;
    assert_eq!(body, json!({ "status": "failed", "error": "Method not allowed" }));
}

#[tokio::test]
async fn generate_with_missing_fields_is_bad_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json("/generate", json!({ "prompt": "a cat", "api": "clipdrop" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "missing required fields: style, size");
}

#[tokio::test]
async fn generate_with_unknown_api_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/generate",
            json!({ "prompt": "a cat", "style": "anime", "size": "512x512", "api": "dalle" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid API selected"));
}

#[tokio::test]
async fn generate_without_key_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_without_keys(&server)
        .oneshot(post_json(
            "/generate",
            json!({ "prompt": "a cat", "style": "anime", "size": "512x512", "api": "clipdrop" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("CLIPDROP_API_KEY"));
}

#[tokio::test]
async fn generate_with_clipdrop_returns_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text-to-image/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/generate",
            json!({ "prompt": "a cat", "style": "anime", "size": "512x512", "api": "clipdrop" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body,
        json!({
            "success": true,
            "api": "clipdrop",
            "imageUrl": "data:image/png;base64,iVBORw==",
        })
    );
}

#[tokio::test]
async fn generate_with_stability_returns_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artifacts": [{ "base64": "iVBORw==", "finishReason": "SUCCESS" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/api/generate",
            json!({ "prompt": "a cat", "style": "anime", "size": "768x768", "api": "stability" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["imageUrl"], "data:image/png;base64,iVBORw==");
    assert!(body.get("jobId").is_none());
}

#[tokio::test]
async fn generate_with_horde_returns_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/generate/async"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "id": "abc-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/generate",
            json!({ "prompt": "a cat", "style": "anime", "size": "512x512", "api": "horde" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body,
        json!({ "success": true, "api": "horde", "jobId": "abc-123" })
    );
}

#[tokio::test]
async fn generate_upstream_failure_is_server_error_with_provider_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text-to-image/v1"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({ "error": "Not enough credits" })))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post_json(
            "/generate",
            json!({ "prompt": "a cat", "style": "anime", "size": "512x512", "api": "clipdrop" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(
        body,
        json!({ "success": false, "error": "ClipDrop: API error: 402 - Not enough credits" })
    );
}

#[tokio::test]
async fn status_without_job_id_is_bad_request() {
    let server = MockServer::start().await;

    for uri in ["/status", "/status?jobId=", "/api/status"] {
        let response = app(&server).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "GET {}", uri);
        let body = read_json(response).await;
        assert_eq!(body, json!({ "status": "failed", "error": "Job ID required" }));
    }
}

#[tokio::test]
async fn status_reports_processing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/generate/check/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "done": false,
            "queue_position": 3,
            "wait_time": 20,
        })))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(get("/status?jobId=abc-123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body,
        json!({ "status": "processing", "queue_position": 3, "wait_time": 20 })
    );
}

#[tokio::test]
async fn status_reports_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/generate/check/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/generate/status/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "generations": [{ "img": "https://cdn.example.com/abc-123.webp" }]
        })))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(get("/api/status?jobId=abc-123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body,
        json!({ "status": "completed", "imageUrl": "https://cdn.example.com/abc-123.webp" })
    );
}

#[tokio::test]
async fn status_reports_failed_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/generate/check/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/generate/status/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "generations": [] })))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(get("/status?jobId=abc-123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body, json!({ "status": "failed", "error": "No image generated" }));
}

#[tokio::test]
async fn status_upstream_failure_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/generate/check/abc-123"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(get("/status?jobId=abc-123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "AI Horde: API error: 503 - maintenance");
}

#[tokio::test]
async fn health_lists_configured_providers() {
    let server = MockServer::start().await;

    let response = app(&server).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], json!(["horde", "clipdrop", "stability"]));
}
