//! Staff authentication routes: sign-up, sign-in, refresh and sign-out.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::staff::{RefreshRequest, SignInRequest, SignUpRequest, StaffIdentity};
use domain::services::{AccessError, AccessLevel};
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{StaffAccess, StaffSession};
use crate::services::auth::AuthTokens;

/// Response body for a successful sign-in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub staff: StaffIdentity,
    pub tokens: AuthTokens,
    /// `None` when the account holds no staff role yet.
    pub access: Option<AccessLevel>,
}

/// Create a staff identity. It has no roles until a manager grants one.
///
/// POST /api/v1/auth/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<StaffIdentity>), ApiError> {
    request.validate()?;
    let identity = state.sessions.sign_up(&request).await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

/// POST /api/v1/auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    request.validate()?;
    let (staff, tokens) = state
        .sessions
        .sign_in(&request.email, &request.password)
        .await?;

    let access = match state.access.resolve(staff.id).await {
        Ok(level) => Some(level),
        Err(AccessError::Denied(reason)) => {
            tracing::info!(staff_id = %staff.id, reason = %reason, "Signed in without dashboard access");
            None
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Json(SignInResponse {
        staff,
        tokens,
        access,
    }))
}

/// Exchange a refresh token for a new token pair.
///
/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthTokens>, ApiError> {
    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::Validation("Refresh token is required".to_string()));
    }
    Ok(Json(state.sessions.refresh(&request.refresh_token).await?))
}

/// POST /api/v1/auth/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    StaffSession(session): StaffSession,
) -> Result<StatusCode, ApiError> {
    state.sessions.sign_out(session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current identity and access. 403 when the account holds no role.
///
/// GET /api/v1/auth/session
pub async fn current_session(staff: StaffAccess) -> Json<AccessLevel> {
    Json(staff.level)
}
