//! Liveness, readiness and health probes.

mod common;

use axum::http::{Method, StatusCode};
use common::{empty_request, TestApp};

#[tokio::test]
async fn test_live_and_ready() {
    let app = TestApp::new();

    let (status, body) = app
        .call(empty_request(Method::GET, "/api/health/live", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");

    let (status, body) = app
        .call(empty_request(Method::GET, "/api/health/ready", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_health_reports_store_and_sessions() {
    let app = TestApp::new();

    let (status, body) = app
        .call(empty_request(Method::GET, "/api/health", None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);
    assert_eq!(body["checkin_sessions"], 0);
}

#[tokio::test]
async fn test_unreachable_store_is_not_ready() {
    let app = TestApp::new();
    app.store.set_failing(true);

    let response = app
        .send(empty_request(Method::GET, "/api/health/ready", None))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app
        .send(empty_request(Method::GET, "/api/health", None))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Liveness does not depend on the store
    let response = app
        .send(empty_request(Method::GET, "/api/health/live", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();
    let response = app
        .send(empty_request(Method::GET, "/api/v1/nothing-here", None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
