//! Integration tests for the alias service API.

use alias_service::{
    api::{create_router, AppState},
    ExpirySweeper, Registrar,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use email_routing_client::EmailRoutingClient;
use kv_store::{KvStore, MemoryKv};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RULES_PATH: &str = "/zones/test-zone/email/routing/rules";

struct TestApp {
    router: Router,
    kv: Arc<MemoryKv>,
    provider: Arc<EmailRoutingClient>,
}

/// Build the app against a mock Email Routing API and a memory store.
fn create_test_app(mock_server: &MockServer) -> TestApp {
    let provider = Arc::new(
        EmailRoutingClient::new(
            "test-token",
            mock_server.uri(),
            "test-zone",
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let kv = Arc::new(MemoryKv::new());
    let registrar = Registrar::new(provider.clone(), kv.clone(), "example.com");

    TestApp {
        router: create_router(AppState::new(registrar)),
        kv,
        provider,
    }
}

fn register_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/register")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn mount_create_success(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "errors": [],
            "result": {"id": "rule-1"}
        })))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_register_permanent_alias() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .and(body_partial_json(serde_json::json!({
            "matchers": [{"type": "literal", "field": "to", "value": "shop@example.com"}],
            "actions": [{"type": "forward", "value": ["owner@example.org"]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "errors": [],
            "result": {"id": "rule-1"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(register_request(
            r#"{"prefix":"shop","targetEmail":"owner@example.org","emailType":"permanent"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["email"], "shop@example.com");
    assert_eq!(json["expiry"], "permanent");
    assert!(app.kv.is_empty().await);
}

#[tokio::test]
async fn test_register_temporary_alias_records_expiry() {
    let mock_server = MockServer::start().await;
    mount_create_success(&mock_server).await;

    let app = create_test_app(&mock_server);
    let before = Utc::now().timestamp_millis();

    let response = app
        .router
        .oneshot(register_request(
            r#"{"prefix":"temp-1","targetEmail":"owner@example.org","emailType":"temporary","expiryMinutes":"10080"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["expiry"], "7 days");

    let stored: i64 = app
        .kv
        .get("temp-1@example.com")
        .await
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    let week_ms = 7 * 24 * 60 * 60 * 1000;
    assert!(stored >= before + week_ms);
    assert!(stored <= Utc::now().timestamp_millis() + week_ms);
}

#[tokio::test]
async fn test_invalid_prefix_makes_no_provider_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(register_request(
            r#"{"prefix":"AB_1","targetEmail":"owner@example.org","emailType":"temporary","expiryMinutes":"10"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_PREFIX");
    assert!(json["error"].as_str().unwrap().contains("lowercase"));
    assert!(app.kv.is_empty().await);
}

#[tokio::test]
async fn test_invalid_target_email() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(register_request(
            r#"{"prefix":"shop","targetEmail":"owner.example.org","emailType":"permanent"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid target email format");
}

#[tokio::test]
async fn test_unknown_email_type_is_client_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(register_request(
            r#"{"prefix":"shop","targetEmail":"owner@example.org","emailType":"forever"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_EMAIL_TYPE");
    assert!(app.kv.is_empty().await);
}

#[tokio::test]
async fn test_provider_rejection_surfaces_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "success": false,
            "errors": [{"code": 2020, "message": "X"}]
        })))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(register_request(
            r#"{"prefix":"shop","targetEmail":"owner@example.org","emailType":"temporary","expiryMinutes":"10"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to create forwarding rule: X");
    assert_eq!(json["code"], "RULE_REJECTED");
    assert!(app.kv.is_empty().await);
}

#[tokio::test]
async fn test_malformed_body_is_server_error() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(register_request("{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().starts_with("Server error: "));
}

#[tokio::test]
async fn test_unreachable_provider_is_server_error() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();
    drop(mock_server);

    let provider =
        EmailRoutingClient::new("test-token", uri, "test-zone", Duration::from_secs(1)).unwrap();
    let registrar = Registrar::new(Arc::new(provider), Arc::new(MemoryKv::new()), "example.com");
    let router = create_router(AppState::new(registrar));

    let response = router
        .oneshot(register_request(
            r#"{"prefix":"shop","targetEmail":"owner@example.org","emailType":"permanent"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_path_not_found() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let json = body_json(response).await;
    assert_eq!(json["error"], "Not Found");
}

#[tokio::test]
async fn test_wrong_method_not_found() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/register")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Not Found");
}

#[tokio::test]
async fn test_register_then_sweep_round_trip() {
    let mock_server = MockServer::start().await;
    mount_create_success(&mock_server).await;

    Mock::given(method("GET"))
        .and(path(RULES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "errors": [],
            "result": [{
                "id": "rule-1",
                "matchers": [{"type": "literal", "field": "to", "value": "temp@example.com"}],
                "actions": [{"type": "forward", "value": ["owner@example.org"]}],
                "enabled": true,
                "priority": 10
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/rule-1", RULES_PATH)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"success": true, "errors": [], "result": {"id": "rule-1"}})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let registered_at = Utc::now();

    let response = app
        .router
        .oneshot(register_request(
            r#"{"prefix":"temp","targetEmail":"owner@example.org","emailType":"temporary","expiryMinutes":"10"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["expiry"], "10 minutes");

    let stored: i64 = app
        .kv
        .get("temp@example.com")
        .await
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    let expected = registered_at.timestamp_millis() + 600_000;
    assert!((stored - expected).abs() < 5_000);

    let sweeper = ExpirySweeper::new(app.provider.clone(), app.kv.clone(), Duration::from_secs(60));

    // Not due yet
    let early = sweeper.sweep_at(registered_at + ChronoDuration::minutes(5)).await;
    assert_eq!(early.expired, 0);

    // Past the window
    let late = sweeper
        .sweep_at(registered_at + ChronoDuration::seconds(610))
        .await;
    assert_eq!(late.removed, vec!["temp@example.com".to_string()]);
    assert!(app.kv.get("temp@example.com").await.unwrap().is_none());
}
