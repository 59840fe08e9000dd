//! Staff management: role catalogue, account creation and role changes.

mod common;

use axum::http::{Method, StatusCode};
use common::{empty_request, json_request, TestApp, PASSWORD};
use domain::models::staff::StaffRole;
use domain::services::StaffStore;
use serde_json::{json, Value};

fn new_staff(email: &str, role: &str) -> Value {
    json!({
        "email": email,
        "displayName": "Door Volunteer",
        "password": PASSWORD,
        "role": role
    })
}

#[tokio::test]
async fn test_role_catalogue_lists_every_role() {
    let app = TestApp::new();
    let operator = app.staff(&[StaffRole::CheckinOperator]).await;

    let (status, body) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/roles",
            Some(&operator.access_token),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let roles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["role"].as_str().unwrap())
        .collect();
    assert_eq!(
        roles,
        vec!["super_admin", "admin", "registrations_manager", "checkin_operator"]
    );
}

#[tokio::test]
async fn test_admin_creates_staff_with_role() {
    let app = TestApp::new();
    let admin = app.staff(&[StaffRole::Admin]).await;

    let (status, body) = app
        .call(json_request(
            Method::POST,
            "/api/v1/admin/staff",
            new_staff("volunteer@example.com", "checkin_operator"),
            Some(&admin.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["roles"], json!(["checkin_operator"]));

    // The new account can sign in and scan straight away
    let (status, body) = app
        .call(json_request(
            Method::POST,
            "/api/v1/auth/sign-in",
            json!({ "email": "volunteer@example.com", "password": PASSWORD }),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access"]["roles"], json!(["checkin_operator"]));

    let (status, _) = app
        .call(json_request(
            Method::POST,
            "/api/v1/admin/staff",
            new_staff("volunteer@example.com", "checkin_operator"),
            Some(&admin.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_only_super_admin_creates_super_admin() {
    let app = TestApp::new();
    let admin = app.staff(&[StaffRole::Admin]).await;
    let root = app.staff(&[StaffRole::SuperAdmin]).await;
    let before = app.store.staff_count();

    let (status, _) = app
        .call(json_request(
            Method::POST,
            "/api/v1/admin/staff",
            new_staff("boss@example.com", "super_admin"),
            Some(&admin.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.staff_count(), before);

    let (status, _) = app
        .call(json_request(
            Method::POST,
            "/api/v1/admin/staff",
            new_staff("boss@example.com", "super_admin"),
            Some(&root.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_operator_cannot_manage_staff() {
    let app = TestApp::new();
    let operator = app.staff(&[StaffRole::CheckinOperator]).await;

    let (status, _) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/staff",
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(json_request(
            Method::POST,
            "/api/v1/admin/staff",
            new_staff("x@example.com", "checkin_operator"),
            Some(&operator.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_super_admin_grants_and_revokes_roles() {
    let app = TestApp::new();
    let root = app.staff(&[StaffRole::SuperAdmin]).await;
    let member = app.staff(&[]).await;
    let roles_uri = format!("/api/v1/admin/staff/{}/roles", member.id);

    let (status, body) = app
        .call(json_request(
            Method::POST,
            &roles_uri,
            json!({ "role": "registrations_manager" }),
            Some(&root.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["registrations_manager"]));

    // The grant applies to the member's next request
    let (status, _) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/stats",
            Some(&member.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(empty_request(
            Method::DELETE,
            &format!("{}/registrations_manager", roles_uri),
            Some(&root.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!([]));

    let (status, _) = app
        .call(empty_request(
            Method::DELETE,
            &format!("{}/bouncer", roles_uri),
            Some(&root.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_last_super_admin_is_protected() {
    let app = TestApp::new();
    let root = app.staff(&[StaffRole::SuperAdmin]).await;

    let (status, _) = app
        .call(empty_request(
            Method::DELETE,
            &format!("/api/v1/admin/staff/{}/roles/super_admin", root.id),
            Some(&root.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(empty_request(
            Method::DELETE,
            &format!("/api/v1/admin/staff/{}", root.id),
            Some(&root.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert!(app
        .store
        .roles_of(root.id)
        .await
        .unwrap()
        .contains(&StaffRole::SuperAdmin));
}

#[tokio::test]
async fn test_delete_staff_member() {
    let app = TestApp::new();
    let root = app.staff(&[StaffRole::SuperAdmin]).await;
    let member = app.staff(&[StaffRole::CheckinOperator]).await;

    let (status, listed) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/staff",
            Some(&root.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let uri = format!("/api/v1/admin/staff/{}", member.id);
    let (status, _) = app
        .call(empty_request(Method::DELETE, &uri, Some(&root.access_token)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(empty_request(Method::DELETE, &uri, Some(&root.access_token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The deleted member's token no longer works
    let (status, _) = app
        .call(empty_request(
            Method::GET,
            "/api/v1/admin/stats",
            Some(&member.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
