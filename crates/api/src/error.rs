use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::services::{
    AccessDenied, AccessError, AdmissionError, CheckInError, DeviceError, StoreError, TicketError,
};
use serde::Serialize;
use shared::jwt::JwtError;
use shared::pagination::CursorError;
use shared::password::PasswordError;
use thiserror::Error;

use crate::services::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Store timeout: {0}")]
    StoreTimeout(String),

    /// A domain rejection with its own stable error code.
    #[error("{code}: {message}")]
    Rejected {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    pub(crate) fn rejected(
        status: StatusCode,
        code: &'static str,
        message: impl ToString,
    ) -> Self {
        ApiError::Rejected {
            status,
            code,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::StoreTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "store_timeout", msg),
            ApiError::Rejected {
                status,
                code,
                message,
            } => (status, code, message),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => ApiError::Conflict("Resource already exists".into()),
            StoreError::Timeout(_) => {
                ApiError::StoreTimeout("The data store did not respond in time".into())
            }
            StoreError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Store unavailable");
                ApiError::ServiceUnavailable("The data store is unavailable".into())
            }
            StoreError::Backend(msg) => ApiError::Internal(format!("Store error: {}", msg)),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        persistence::error::map_sqlx(err).into()
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        let code = err.code();
        match err {
            AdmissionError::EmptyRequiredField(_) | AdmissionError::InvalidField { .. } => {
                ApiError::rejected(StatusCode::BAD_REQUEST, code, err)
            }
            AdmissionError::RegistrationClosed => {
                ApiError::rejected(StatusCode::FORBIDDEN, code, err)
            }
            AdmissionError::CapacityReached | AdmissionError::DuplicatePhone => {
                ApiError::rejected(StatusCode::CONFLICT, code, err)
            }
            AdmissionError::StoreTimeout => ApiError::StoreTimeout(err.to_string()),
            AdmissionError::Store(store) => store.into(),
        }
    }
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        let status = match err {
            DeviceError::Busy => StatusCode::CONFLICT,
            DeviceError::PermissionDenied => StatusCode::FORBIDDEN,
            DeviceError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        ApiError::rejected(status, err.code(), err)
    }
}

impl From<CheckInError> for ApiError {
    fn from(err: CheckInError) -> Self {
        match err {
            CheckInError::NothingPending => {
                ApiError::rejected(StatusCode::CONFLICT, "nothing_pending", err)
            }
            CheckInError::UnknownRegistration(_) => {
                ApiError::rejected(StatusCode::NOT_FOUND, "unknown_registration", err)
            }
            CheckInError::StoreTimeout => ApiError::StoreTimeout(err.to_string()),
            CheckInError::Store(store) => store.into(),
            CheckInError::Device(device) => device.into(),
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(err: AccessDenied) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::UnknownStaff => ApiError::Unauthorized("Staff account not found".into()),
            AccessError::Denied(denied) => denied.into(),
            AccessError::Store(store) => store.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailAlreadyExists => {
                ApiError::Conflict("Email already registered".into())
            }
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".into())
            }
            AuthError::InvalidRefreshToken => {
                ApiError::Unauthorized("Invalid or expired refresh token".into())
            }
            AuthError::SessionNotFound => {
                ApiError::Unauthorized("Session is no longer valid".into())
            }
            AuthError::Token(jwt) => jwt.into(),
            AuthError::Password(password) => password.into(),
            AuthError::Store(store) => store.into(),
        }
    }
}

impl From<TicketError> for ApiError {
    fn from(err: TicketError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".into()),
            JwtError::InvalidToken | JwtError::DecodingError(_) => {
                ApiError::Unauthorized("Invalid token".into())
            }
            JwtError::EncodingError(msg) | JwtError::InvalidKey(msg) => {
                ApiError::Internal(format!("Token signing failed: {}", msg))
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CursorError> for ApiError {
    fn from(_: CursorError) -> Self {
        ApiError::Validation("Invalid cursor".into())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation(message)
    }
}
