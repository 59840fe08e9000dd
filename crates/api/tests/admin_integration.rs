//! Staff dashboard: counters, registration switch and registration management.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{empty_request, json_request, TestApp};
use domain::models::staff::StaffRole;
use serde_json::json;

#[tokio::test]
async fn test_dashboard_requires_a_token() {
    let app = TestApp::new();

    let (status, body) = app
        .call(empty_request(Method::GET, "/api/v1/admin/stats", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app
        .call(empty_request(Method::GET, "/api/v1/admin/stats", Some("garbage")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_account_without_roles_is_forbidden() {
    let app = TestApp::new();
    let nobody = app.staff(&[]).await;

    let (status, body) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/stats",
            Some(&nobody.access_token),
        ))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_stats_reflect_registrations_and_check_ins() {
    let app = TestApp::new();
    let operator = app.staff(&[StaffRole::CheckinOperator]).await;
    app.store.seed_registrations(3);

    let (status, _) = app
        .call(json_request(
            Method::PUT,
            "/api/v1/admin/registrations/2/check-in",
            json!({ "checkedIn": true }),
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/stats",
            Some(&operator.access_token),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["checkedIn"], 1);
    assert_eq!(body["capacity"], 1500);
    assert_eq!(body["available"], 1497);
    assert_eq!(body["registrationEnabled"], true);
}

#[tokio::test]
async fn test_registration_switch_closes_the_form() {
    let app = TestApp::new();
    let admin = app.staff(&[StaffRole::Admin]).await;

    let (status, body) = app
        .call(json_request(
            Method::PUT,
            "/api/v1/admin/settings/registration-enabled",
            json!({ "enabled": false }),
            Some(&admin.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);

    let (_, body) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/settings/registration-enabled",
            Some(&admin.access_token),
        ))
        .await;
    assert_eq!(body["enabled"], false);

    let (status, body) = app.register("Ana Lopez", "555-1111").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "registration_closed");
}

#[tokio::test]
async fn test_operator_cannot_change_settings_or_edit() {
    let app = TestApp::new();
    let operator = app.staff(&[StaffRole::CheckinOperator]).await;
    app.store.seed_registrations(1);

    let (status, _) = app
        .call(json_request(
            Method::PUT,
            "/api/v1/admin/settings/registration-enabled",
            json!({ "enabled": false }),
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(json_request(
            Method::PATCH,
            "/api/v1/admin/registrations/1",
            json!({ "fullName": "Changed" }),
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(empty_request(
            Method::DELETE,
            "/api/v1/admin/registrations/1",
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_registrations_paginates_newest_first() {
    let app = TestApp::new();
    let manager = app.staff(&[StaffRole::RegistrationsManager]).await;
    for (name, phone) in [("One", "555-0001"), ("Two", "555-0002"), ("Three", "555-0003")] {
        let (status, _) = app.register(name, phone).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, first) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/registrations?limit=2",
            Some(&manager.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = first["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["fullName"], "Three");
    assert_eq!(items[1]["fullName"], "Two");

    let cursor = first["nextCursor"].as_str().unwrap();
    let (status, second) = app
        .call(empty_request(
            Method::GET,
            &format!("/api/v1/admin/registrations?limit=2&cursor={}", cursor),
            Some(&manager.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = second["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["fullName"], "One");
    assert!(second["nextCursor"].is_null());
}

#[tokio::test]
async fn test_invalid_cursor_is_rejected() {
    let app = TestApp::new();
    let manager = app.staff(&[StaffRole::RegistrationsManager]).await;

    let (status, body) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/registrations?cursor=not-a-cursor",
            Some(&manager.access_token),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_manager_edits_and_deletes_registrations() {
    let app = TestApp::new();
    let manager = app.staff(&[StaffRole::RegistrationsManager]).await;
    let (_, created) = app.register("Ana Lopez", "555-1111").await;
    app.register("Luis Perez", "555-2222").await;
    let id = created["registration"]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/admin/registrations/{}", id);

    let (status, body) = app
        .call(json_request(
            Method::PATCH,
            &uri,
            json!({ "fullName": "Ana María López", "organization": "" }),
            Some(&manager.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fullName"], "Ana María López");
    assert!(body["organization"].is_null());
    assert_eq!(body["phone"], "555-1111");

    let (status, body) = app
        .call(json_request(
            Method::PATCH,
            &uri,
            json!({ "phone": "555-2222" }),
            Some(&manager.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_phone");

    let (status, _) = app
        .call(json_request(Method::PATCH, &uri, json!({}), Some(&manager.access_token)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(empty_request(Method::DELETE, &uri, Some(&manager.access_token)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(empty_request(Method::GET, &uri, Some(&manager.access_token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_edit_is_rejected() {
    let app = TestApp::new();
    let manager = app.staff(&[StaffRole::RegistrationsManager]).await;
    app.store.seed_registrations(1);

    let (status, body) = app
        .call(json_request(
            Method::PATCH,
            "/api/v1/admin/registrations/1",
            json!({ "address": "   " }),
            Some(&manager.access_token),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_required_field");
}

#[tokio::test]
async fn test_ticket_renders_png_and_svg() {
    let app = TestApp::new();
    let operator = app.staff(&[StaffRole::CheckinOperator]).await;
    let (_, created) = app.register("Ana Lopez", "555-1111").await;
    let id = created["registration"]["id"].as_i64().unwrap();

    let response = app
        .send(empty_request(
            Method::GET,
            &format!("/api/v1/admin/registrations/{}/ticket", id),
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let response = app
        .send(empty_request(
            Method::GET,
            &format!("/api/v1/admin/registrations/{}/ticket?format=svg", id),
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("<svg"));

    let (status, _) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/registrations/9999/ticket",
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_check_in_flag_can_be_cleared() {
    let app = TestApp::new();
    let operator = app.staff(&[StaffRole::CheckinOperator]).await;
    app.store.seed_registrations(1);

    for checked_in in [true, false] {
        let (status, body) = app
            .call(json_request(
                Method::PUT,
                "/api/v1/admin/registrations/1/check-in",
                json!({ "checkedIn": checked_in }),
                Some(&operator.access_token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checkedIn"], checked_in);
    }

    let (status, _) = app
        .call(json_request(
            Method::PUT,
            "/api/v1/admin/registrations/42/check-in",
            json!({ "checkedIn": true }),
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
