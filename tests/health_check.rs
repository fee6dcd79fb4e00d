//! Health, docs and fallback integration tests.

mod common;

use common::{json_body, TestApp};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn health_check_returns_ok() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health").await;

    assert_status!(response, 200);
    let body = response.text().await.expect("Failed to read response body");
    assert_eq!(body, "OK");
}

#[tokio::test]
#[serial]
async fn readiness_reports_database_and_live_connections() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health/ready").await;

    assert_status!(response, 200);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["database"]["status"], "up");
    assert_eq!(body["checks"]["live_connections"], 0);
}

#[tokio::test]
#[serial]
async fn unknown_route_returns_json_not_found() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/nonexistent-endpoint").await;

    assert_status!(response, 404);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
#[serial]
async fn openapi_document_is_served() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/api-docs/openapi.json").await;

    assert_status!(response, 200);
    let body = json_body(response).await;
    assert_eq!(body["info"]["title"], "ProjectHub API");
    assert!(body["paths"]["/tasks/{task_id}/assignees"].is_object());
}

#[tokio::test]
#[serial]
async fn protected_routes_require_a_token() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/projects").await;

    assert_status!(response, 401);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
#[serial]
async fn metrics_endpoint_reports_disabled_by_default() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/metrics").await;

    assert_status!(response, 503);
}
