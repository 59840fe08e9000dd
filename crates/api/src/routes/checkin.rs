//! Door check-in sessions.
//!
//! The door device decodes QR frames itself and posts the decoded text to
//! `/scans`. The operator then confirms or cancels the pending ticket.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::registration::Registration;
use domain::models::staff::GatedAction;
use domain::models::ticket::TicketPayload;
use domain::services::{DecodeError, DeviceError, ScanOutcome};
use serde::{Deserialize, Serialize};
use shared::validation::validate_not_blank;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::StaffAccess;
use crate::services::scanner_registry::{ScannerSession, ScannerSnapshot};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    #[validate(length(min = 1, max = 100, message = "Device id must be between 1 and 100 characters"))]
    #[validate(custom(function = "validate_not_blank"))]
    pub device_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 4096, message = "Scanned text must be between 1 and 4096 characters"))]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceErrorRequest {
    pub error: DeviceError,
}

/// Result of a submitted scan.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub session: ScannerSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub registration: Registration,
    pub session: ScannerSnapshot,
}

fn decode_reason(err: &DecodeError) -> &'static str {
    match err {
        DecodeError::MalformedPayload => "malformed_payload",
        DecodeError::IncompleteFields => "incomplete_fields",
    }
}

fn session_for(
    state: &AppState,
    staff: &StaffAccess,
    session_id: Uuid,
) -> Result<Arc<ScannerSession>, ApiError> {
    staff.require(GatedAction::RunScanner)?;
    state
        .scanners
        .get(session_id, staff.staff_id())
        .ok_or_else(|| ApiError::NotFound("Check-in session not found".to_string()))
}

/// Start scanning on a door device.
///
/// POST /api/v1/checkin/sessions
pub async fn open_session(
    State(state): State<AppState>,
    staff: StaffAccess,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<ScannerSnapshot>), ApiError> {
    staff.require(GatedAction::RunScanner)?;
    request.validate()?;

    let session = state
        .scanners
        .open(staff.staff_id(), request.device_id.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(session.snapshot().await)))
}

/// GET /api/v1/checkin/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ScannerSnapshot>, ApiError> {
    let session = session_for(&state, &staff, session_id)?;
    Ok(Json(session.snapshot().await))
}

/// Stop scanning and release the device.
///
/// DELETE /api/v1/checkin/sessions/:session_id
pub async fn close_session(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    staff.require(GatedAction::RunScanner)?;
    if state.scanners.close(session_id, staff.staff_id()).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Check-in session not found".to_string()))
    }
}

/// Feed decoded QR text into the session.
///
/// POST /api/v1/checkin/sessions/:session_id/scans
pub async fn submit_scan(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    request.validate()?;
    let session = session_for(&state, &staff, session_id)?;
    let mut workflow = session.workflow().await;

    let response = match workflow.on_scan(&request.text) {
        ScanOutcome::AwaitingConfirmation(ticket) => ScanResponse {
            outcome: "awaiting_confirmation",
            ticket: Some(ticket),
            reason: None,
            message: None,
            session: session.snapshot_of(&workflow),
        },
        ScanOutcome::Rejected(err) => ScanResponse {
            outcome: "rejected",
            ticket: None,
            reason: Some(decode_reason(&err)),
            message: Some(err.to_string()),
            session: session.snapshot_of(&workflow),
        },
        ScanOutcome::Ignored => ScanResponse {
            outcome: "ignored",
            ticket: None,
            reason: None,
            message: None,
            session: session.snapshot_of(&workflow),
        },
    };
    Ok(Json(response))
}

/// Check in the pending attendee.
///
/// POST /api/v1/checkin/sessions/:session_id/confirm
pub async fn confirm(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let session = session_for(&state, &staff, session_id)?;
    let mut workflow = session.workflow().await;

    let registration = workflow.confirm().await?;
    info!(
        staff_id = %staff.staff_id(),
        session_id = %session_id,
        registration_id = registration.id,
        "Check-in confirmed"
    );

    Ok(Json(ConfirmResponse {
        registration,
        session: session.snapshot_of(&workflow),
    }))
}

/// Discard the pending ticket and resume scanning.
///
/// POST /api/v1/checkin/sessions/:session_id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ScannerSnapshot>, ApiError> {
    let session = session_for(&state, &staff, session_id)?;
    let mut workflow = session.workflow().await;
    workflow.cancel()?;
    Ok(Json(session.snapshot_of(&workflow)))
}

/// Scan the next attendee after a check-in or a device error.
///
/// POST /api/v1/checkin/sessions/:session_id/restart
pub async fn restart(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ScannerSnapshot>, ApiError> {
    let session = session_for(&state, &staff, session_id)?;
    let mut workflow = session.workflow().await;
    workflow.start()?;
    Ok(Json(session.snapshot_of(&workflow)))
}

/// The device lost its camera. The session releases it and shows the error.
///
/// POST /api/v1/checkin/sessions/:session_id/device-error
pub async fn report_device_error(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(session_id): Path<Uuid>,
    Json(request): Json<DeviceErrorRequest>,
) -> Result<Json<ScannerSnapshot>, ApiError> {
    let session = session_for(&state, &staff, session_id)?;
    let mut workflow = session.workflow().await;

    tracing::warn!(
        session_id = %session_id,
        device_id = workflow.device_id(),
        error = request.error.code(),
        "Device reported camera failure"
    );
    workflow.fail(request.error);
    Ok(Json(session.snapshot_of(&workflow)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_request_parses_codes() {
        let request: DeviceErrorRequest =
            serde_json::from_str(r#"{"error":"permission_denied"}"#).unwrap();
        assert_eq!(request.error, DeviceError::PermissionDenied);
        assert!(serde_json::from_str::<DeviceErrorRequest>(r#"{"error":"melted"}"#).is_err());
    }

    #[test]
    fn test_decode_reasons() {
        assert_eq!(decode_reason(&DecodeError::MalformedPayload), "malformed_payload");
        assert_eq!(decode_reason(&DecodeError::IncompleteFields), "incomplete_fields");
    }

    #[test]
    fn test_blank_device_id_rejected() {
        let request = OpenSessionRequest {
            device_id: String::new(),
        };
        assert!(request.validate().is_err());

        let request = OpenSessionRequest {
            device_id: "   ".to_string(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("device_id"));

        let request = OpenSessionRequest {
            device_id: " door-1 ".to_string(),
        };
        assert!(request.validate().is_ok());
    }
}
