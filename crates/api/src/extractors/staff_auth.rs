//! Staff authentication extractors.
//!
//! [`StaffSession`] accepts any signed-in staff identity, including one
//! without roles. [`StaffAccess`] additionally resolves roles and rejects an
//! identity that holds none. Both hit the session and role stores on every
//! request, so sign-out and role changes apply immediately.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domain::models::staff::{Capability, GatedAction, StaffRole};
use domain::services::AccessLevel;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::auth::Authenticated;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

/// A signed-in staff identity with a live session.
#[derive(Debug, Clone, Copy)]
pub struct StaffSession(pub Authenticated);

#[async_trait]
impl FromRequestParts<AppState> for StaffSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<Authenticated>() {
            return Ok(StaffSession(*auth));
        }

        let token = bearer_token(parts)?;
        let auth = state.sessions.authenticate(token).await?;
        parts.extensions.insert(auth);
        Ok(StaffSession(auth))
    }
}

/// A signed-in staff member and what they may do.
#[derive(Debug, Clone)]
pub struct StaffAccess {
    pub session: Authenticated,
    pub level: AccessLevel,
}

impl StaffAccess {
    pub fn staff_id(&self) -> Uuid {
        self.session.staff_id
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.level.can(capability)
    }

    pub fn has_role(&self, role: StaffRole) -> bool {
        self.level.has_role(role)
    }

    /// Fails with 403 unless the action's capability is granted.
    pub fn require(&self, action: GatedAction) -> Result<(), ApiError> {
        self.level.require(action).map_err(|denied| {
            tracing::info!(
                staff_id = %self.staff_id(),
                action = ?action,
                reason = %denied,
                "Staff action denied"
            );
            ApiError::from(denied)
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for StaffAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let StaffSession(session) = StaffSession::from_request_parts(parts, state).await?;
        let level = state.access.resolve(session.staff_id).await?;
        Ok(StaffAccess { session, level })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        assert!(matches!(
            bearer_token(&parts_with(None)),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(bearer_token(&parts_with(Some("Basic dXNlcjpwYXNz"))).is_err());
        assert!(bearer_token(&parts_with(Some("Bearer "))).is_err());
    }
}
