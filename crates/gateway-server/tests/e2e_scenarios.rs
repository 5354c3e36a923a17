//! End-to-end tests for the numbered scenarios in spec §8, driven through
//! the real `axum::Router` with `tower::ServiceExt::oneshot` rather than
//! calling handlers directly, so the full middleware stack (CORS, tracing,
//! timeout) and route wiring are exercised too.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use gateway_server::config::ServerConfig;
use tower::ServiceExt;

async fn test_router() -> axum::Router {
    let config = ServerConfig::default();
    let state = gateway_server::build_app_state(config)
        .await
        .expect("in-memory app state always builds");
    gateway_server::build_router(state)
}

fn envelope_body(id: i64, method: &str, params: serde_json::Value) -> String {
    serde_json::json!({
        "version": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

/// Scenario 1: unauthorized health check succeeds.
#[tokio::test]
async fn unauthorized_health_check_succeeds() {
    let router = test_router().await;
    let body = envelope_body(1, "health", serde_json::json!({}));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["result"]["status"], "healthy");
    assert!(json["result"]["uptime_seconds"].as_u64().unwrap() < u64::MAX);
}

/// Scenario 2: anonymous generate is refused when auth is required.
#[tokio::test]
async fn anonymous_generate_refused_when_auth_required() {
    let mut config = ServerConfig::default();
    config.require_auth_for_generate = true;
    let state = gateway_server::build_app_state(config).await.unwrap();
    let router = gateway_server::build_router(state);

    let body = envelope_body(
        2,
        "generateText",
        serde_json::json!({"content": "hi", "prompt_id": "default"}),
    );

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["id"], 2);
    assert_eq!(json["error"]["code"], -32001);
}

/// Boundary: a method name with an invalid character is `invalid_request`.
#[tokio::test]
async fn invalid_method_charset_is_rejected() {
    let router = test_router().await;
    let body = envelope_body(3, "bad method!", serde_json::json!({}));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"]["code"], -32600);
}

/// Boundary: an unknown method is `method_not_found`.
#[tokio::test]
async fn unknown_method_is_not_found() {
    let router = test_router().await;
    let body = envelope_body(4, "totallyUnknownMethod", serde_json::json!({}));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"]["code"], -32601);
}

/// Exceeding the sliding window on a shared identity yields `rate_limited`
/// with a positive `retry_after_seconds` (spec §5/§7).
#[tokio::test]
async fn exceeding_rate_limit_returns_retry_after() {
    let mut config = ServerConfig::default();
    config.rate_limit.max = 1;
    let state = gateway_server::build_app_state(config).await.unwrap();
    let router = gateway_server::build_router(state);

    let make_request = || {
        Request::builder()
            .method("POST")
            .uri("/rpc")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(envelope_body(1, "ping", serde_json::json!({}))))
            .unwrap()
    };

    let first = router.clone().oneshot(make_request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router.oneshot(make_request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let bytes = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"]["code"], -32003);
    assert!(json["error"]["data"]["retry_after_seconds"].as_u64().unwrap() >= 1);
}

/// `GET /health` is a separate, bare-GET endpoint from the envelope method
/// of the same name (spec §6).
#[tokio::test]
async fn bare_health_endpoint_responds() {
    let router = test_router().await;
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "healthy");
}
