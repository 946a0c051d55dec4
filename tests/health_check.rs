//! Health, readiness, metrics and fallback routes.

mod common;

use common::TestApp;
use serde_json::Value;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn health_check_reports_service() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health").await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "pawtrack");
}

#[tokio::test]
#[serial]
async fn readiness_checks_database_without_redis() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health/ready").await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["database"]["status"], "up");
    assert!(body["checks"].get("redis").is_none());
}

#[tokio::test]
#[serial]
async fn unknown_route_returns_json_404() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/kennels").await;

    assert_status!(response, 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
#[serial]
async fn protected_route_requires_token() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/dogs").await;

    assert_status!(response, 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_AUTH_HEADER");
}

#[tokio::test]
#[serial]
async fn response_echoes_request_id() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/health", app.base_url))
        .header("x-request-id", "walk-42")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "walk-42"
    );
}
