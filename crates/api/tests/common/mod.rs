//! Shared fixtures for the API integration tests.
//!
//! The router runs over `InMemoryStore`, so no database is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use domain::models::staff::{NewStaff, StaffRole};
use domain::services::{InMemoryStore, StaffStore};
use event_registration_api::{
    app::{create_app, AppState},
    config::{
        AdminBootstrapConfig, CheckInConfig, Config, DatabaseConfig, EventConfig, JwtAuthConfig,
        LoggingConfig, SecurityConfig, ServerConfig, TicketConfig,
    },
};
use fake::{faker::name::en::Name, Fake};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Door-Staff-2024";

/// Argon2 is slow in debug builds; hash the shared password once per binary.
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| shared::password::hash_password(PASSWORD).unwrap())
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 60,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            cors_origins: vec![],
            registration_rate_limit_per_minute: 0,
            trusted_proxies: vec![],
            hsts_enabled: false,
        },
        jwt: JwtAuthConfig {
            private_key: String::new(),
            public_key: String::new(),
            secret: "integration-test-secret-0123456789".to_string(),
            access_token_expiry_secs: 3600,
            refresh_token_expiry_secs: 86400,
            leeway_secs: 0,
        },
        event: EventConfig {
            identifier: "Test Concert".to_string(),
            max_capacity: 1500,
            store_timeout_ms: 1000,
        },
        ticket: TicketConfig::default(),
        checkin: CheckInConfig::default(),
        admin: AdminBootstrapConfig::default(),
    }
}

/// A signed-in staff member.
pub struct TestStaff {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(config, store.clone(), store.clone(), store.clone())
            .expect("test JWT secret is valid");
        Self {
            store,
            router: create_app(state),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends a request and returns the status and JSON body (`Null` if empty).
    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Creates a staff account holding `roles` and signs it in.
    pub async fn staff(&self, roles: &[StaffRole]) -> TestStaff {
        let name: String = Name().fake();
        let email = format!("staff-{}@example.com", Uuid::new_v4().simple());
        let identity = self
            .store
            .create_staff(NewStaff {
                email: email.clone(),
                display_name: name,
                password_hash: password_hash().to_string(),
                role: None,
                created_by: None,
            })
            .await
            .unwrap();
        for role in roles {
            self.store.add_role(identity.id, *role, None).await.unwrap();
        }

        let (status, body) = self
            .call(json_request(
                Method::POST,
                "/api/v1/auth/sign-in",
                json!({ "email": email, "password": PASSWORD }),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {}", body);

        TestStaff {
            id: identity.id,
            email,
            access_token: body["tokens"]["accessToken"].as_str().unwrap().to_string(),
            refresh_token: body["tokens"]["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    /// Submits the public form and returns the status and body.
    pub async fn register(&self, name: &str, phone: &str) -> (StatusCode, Value) {
        self.call(json_request(
            Method::POST,
            "/api/v1/registrations",
            registration_form(name, phone),
            None,
        ))
        .await
    }
}

pub fn registration_form(name: &str, phone: &str) -> Value {
    json!({
        "fullName": name,
        "phone": phone,
        "address": "Av. Reforma 100",
        "organization": "Iglesia Central",
        "sponsor": "",
        "attendanceConfirmed": true
    })
}

pub fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
