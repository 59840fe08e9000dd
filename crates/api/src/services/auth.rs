//! Staff sessions: sign-up, sign-in, refresh rotation and sign-out.
//!
//! Tokens are JWTs. Each sign-in creates a server-side session row holding
//! SHA-256 fingerprints of the access and refresh token ids, so a token only
//! works while its session exists and still carries its fingerprint.

use chrono::{Duration as ChronoDuration, Utc};
use domain::models::staff::{NewStaff, SignUpRequest, StaffIdentity, StaffSession};
use domain::services::{bounded, StaffStore, StoreError};
use serde::Serialize;
use shared::crypto::sha256_hex;
use shared::jwt::{extract_staff_id, JwtConfig, JwtError};
use shared::password::{check_password_policy, hash_password, verify_password, PasswordError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Session is no longer valid")]
    SessionNotFound,

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Token pair returned to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// A validated access token bound to a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated {
    pub staff_id: Uuid,
    pub session_id: Uuid,
}

struct IssuedPair {
    tokens: AuthTokens,
    access_hash: String,
    refresh_hash: String,
    expires_at: chrono::DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionService {
    staff: Arc<dyn StaffStore>,
    jwt: Arc<JwtConfig>,
    store_timeout: Duration,
}

impl SessionService {
    pub fn new(staff: Arc<dyn StaffStore>, jwt: Arc<JwtConfig>, store_timeout: Duration) -> Self {
        Self {
            staff,
            jwt,
            store_timeout,
        }
    }

    /// Creates an identity with no roles. Roles are granted by a manager.
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<StaffIdentity, AuthError> {
        check_password_policy(&request.password)?;
        let password_hash = hash_password(&request.password)?;

        let created = bounded(
            self.store_timeout,
            self.staff.create_staff(NewStaff {
                email: request.email.trim().to_lowercase(),
                display_name: request.display_name.trim().to_string(),
                password_hash,
                role: None,
                created_by: None,
            }),
        )
        .await;

        match created {
            Ok(identity) => {
                tracing::info!(staff_id = %identity.id, "Staff identity signed up");
                Ok(identity)
            }
            Err(StoreError::Conflict(_)) => Err(AuthError::EmailAlreadyExists),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(StaffIdentity, AuthTokens), AuthError> {
        let credentials = bounded(
            self.store_timeout,
            self.staff.find_credentials(&email.trim().to_lowercase()),
        )
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &credentials.password_hash)? {
            tracing::info!(staff_id = %credentials.identity.id, "Sign-in rejected: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        let staff_id = credentials.identity.id;
        let issued = self.issue(staff_id)?;
        bounded(
            self.store_timeout,
            self.staff.create_session(StaffSession {
                id: Uuid::new_v4(),
                staff_id,
                access_token_hash: issued.access_hash,
                refresh_token_hash: issued.refresh_hash,
                expires_at: issued.expires_at,
            }),
        )
        .await?;

        tracing::info!(staff_id = %staff_id, "Staff signed in");
        Ok((credentials.identity, issued.tokens))
    }

    /// Exchanges a refresh token for a new pair. The old pair stops working.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|e| match e {
                JwtError::TokenExpired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
                    AuthError::InvalidRefreshToken
                }
                other => AuthError::Token(other),
            })?;
        let staff_id = extract_staff_id(&claims).map_err(|_| AuthError::InvalidRefreshToken)?;

        let session = bounded(
            self.store_timeout,
            self.staff.find_session_by_refresh_hash(&sha256_hex(&claims.jti)),
        )
        .await?
        .filter(|s| s.staff_id == staff_id && s.expires_at > Utc::now())
        .ok_or(AuthError::InvalidRefreshToken)?;

        let issued = self.issue(staff_id)?;
        let rotated = bounded(
            self.store_timeout,
            self.staff.rotate_session(
                session.id,
                &issued.access_hash,
                &issued.refresh_hash,
                issued.expires_at,
            ),
        )
        .await?;
        if !rotated {
            return Err(AuthError::InvalidRefreshToken);
        }

        tracing::debug!(staff_id = %staff_id, session_id = %session.id, "Session refreshed");
        Ok(issued.tokens)
    }

    /// Resolves an access token to its live session.
    pub async fn authenticate(&self, access_token: &str) -> Result<Authenticated, AuthError> {
        let claims = self.jwt.validate_access_token(access_token)?;
        let staff_id = extract_staff_id(&claims)?;

        let session = bounded(
            self.store_timeout,
            self.staff.find_session_by_access_hash(&sha256_hex(&claims.jti)),
        )
        .await?
        .filter(|s| s.staff_id == staff_id && s.expires_at > Utc::now())
        .ok_or(AuthError::SessionNotFound)?;

        Ok(Authenticated {
            staff_id,
            session_id: session.id,
        })
    }

    pub async fn sign_out(&self, session: Authenticated) -> Result<(), AuthError> {
        let removed = bounded(self.store_timeout, self.staff.delete_session(session.session_id))
            .await?;
        if !removed {
            tracing::debug!(session_id = %session.session_id, "Session already gone at sign-out");
        }
        tracing::info!(staff_id = %session.staff_id, "Staff signed out");
        Ok(())
    }

    fn issue(&self, staff_id: Uuid) -> Result<IssuedPair, AuthError> {
        let access = self.jwt.issue_access_token(staff_id)?;
        let refresh = self.jwt.issue_refresh_token(staff_id)?;

        Ok(IssuedPair {
            access_hash: sha256_hex(&access.jti),
            refresh_hash: sha256_hex(&refresh.jti),
            expires_at: Utc::now() + ChronoDuration::seconds(self.jwt.refresh_token_expiry_secs),
            tokens: AuthTokens {
                access_token: access.token,
                refresh_token: refresh.token,
                token_type: "Bearer",
                expires_in: self.jwt.access_token_expiry_secs,
            },
        })
    }
}
