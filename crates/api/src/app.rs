use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::{
    AccessController, AdmissionController, RegistrationStore, SettingsStore, StaffStore,
    TicketCodec,
};
use persistence::repositories::{EventSettingRepository, RegistrationRepository, StaffRepository};
use shared::jwt::JwtError;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, parse_trusted_proxies, registration_rate_limit,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{admin, auth, checkin, health, registrations, staff};
use crate::services::{ScannerRegistry, SessionService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registrations: Arc<dyn RegistrationStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub staff: Arc<dyn StaffStore>,
    pub admission: Arc<AdmissionController>,
    pub access: AccessController,
    pub sessions: SessionService,
    pub tickets: Arc<TicketCodec>,
    pub scanners: Arc<ScannerRegistry>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the domain services over the given stores.
    pub fn new(
        config: Config,
        registrations: Arc<dyn RegistrationStore>,
        settings: Arc<dyn SettingsStore>,
        staff: Arc<dyn StaffStore>,
    ) -> Result<Self, JwtError> {
        let jwt = Arc::new(config.jwt.build()?);
        let store_timeout = config.event.store_timeout();

        let admission = AdmissionController::new(
            registrations.clone(),
            settings.clone(),
            config.event.max_capacity,
            store_timeout,
        );
        let scanners = ScannerRegistry::new(
            registrations.clone(),
            store_timeout,
            Duration::from_secs(config.checkin.session_idle_timeout_secs),
        );

        Ok(Self {
            admission: Arc::new(admission),
            access: AccessController::new(staff.clone(), store_timeout),
            sessions: SessionService::new(staff.clone(), jwt, store_timeout),
            tickets: Arc::new(TicketCodec::new(
                config.event.identifier.clone(),
                config.ticket.qr_min_dimension,
            )),
            scanners: Arc::new(scanners),
            rate_limiter: RateLimiterState::new(
                config.security.registration_rate_limit_per_minute,
                parse_trusted_proxies(&config.security.trusted_proxies),
            )
            .map(Arc::new),
            config: Arc::new(config),
            registrations,
            settings,
            staff,
        })
    }

    /// State backed by the PostgreSQL repositories.
    pub fn with_postgres(config: Config, pool: PgPool) -> Result<Self, JwtError> {
        Self::new(
            config,
            Arc::new(RegistrationRepository::new(pool.clone())),
            Arc::new(EventSettingRepository::new(pool.clone())),
            Arc::new(StaffRepository::new(pool)),
        )
    }

    pub fn store_timeout(&self) -> Duration {
        self.config.event.store_timeout()
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Development: allow any origin
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Public registration form, limited per client address
    let registration_routes = Router::new()
        .route("/api/v1/registrations", post(registrations::register))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            registration_rate_limit,
        ));

    let auth_routes = Router::new()
        .route("/api/v1/auth/sign-up", post(auth::sign_up))
        .route("/api/v1/auth/sign-in", post(auth::sign_in))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .route("/api/v1/auth/sign-out", post(auth::sign_out))
        .route("/api/v1/auth/session", get(auth::current_session));

    // Staff dashboard; every handler checks its own capability
    let admin_routes = Router::new()
        .route("/api/v1/admin/stats", get(admin::get_stats))
        .route(
            "/api/v1/admin/settings/registration-enabled",
            get(admin::get_registration_switch).put(admin::set_registration_switch),
        )
        .route(
            "/api/v1/admin/registrations",
            get(registrations::list_registrations),
        )
        .route(
            "/api/v1/admin/registrations/:registration_id",
            get(registrations::get_registration)
                .patch(registrations::update_registration)
                .delete(registrations::delete_registration),
        )
        .route(
            "/api/v1/admin/registrations/:registration_id/check-in",
            put(registrations::set_check_in),
        )
        .route(
            "/api/v1/admin/registrations/:registration_id/ticket",
            get(registrations::get_ticket),
        )
        .route("/api/v1/admin/roles", get(staff::list_roles))
        .route(
            "/api/v1/admin/staff",
            get(staff::list_staff).post(staff::create_staff),
        )
        .route(
            "/api/v1/admin/staff/:staff_id",
            axum::routing::delete(staff::delete_staff),
        )
        .route("/api/v1/admin/staff/:staff_id/roles", post(staff::add_role))
        .route(
            "/api/v1/admin/staff/:staff_id/roles/:role",
            axum::routing::delete(staff::remove_role),
        );

    let checkin_routes = Router::new()
        .route("/api/v1/checkin/sessions", post(checkin::open_session))
        .route(
            "/api/v1/checkin/sessions/:session_id",
            get(checkin::get_session).delete(checkin::close_session),
        )
        .route(
            "/api/v1/checkin/sessions/:session_id/scans",
            post(checkin::submit_scan),
        )
        .route(
            "/api/v1/checkin/sessions/:session_id/confirm",
            post(checkin::confirm),
        )
        .route(
            "/api/v1/checkin/sessions/:session_id/cancel",
            post(checkin::cancel),
        )
        .route(
            "/api/v1/checkin/sessions/:session_id/restart",
            post(checkin::restart),
        )
        .route(
            "/api/v1/checkin/sessions/:session_id/device-error",
            post(checkin::report_device_error),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(registration_routes)
        .merge(auth_routes)
        .merge(admin_routes)
        .merge(checkin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            config.security.hsts_enabled,
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
