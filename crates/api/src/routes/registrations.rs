//! Registration routes: the public form and the dashboard's registration views.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use domain::models::registration::{
    Registration, RegistrationForm, SetCheckInRequest, UpdateRegistrationRequest,
};
use domain::models::staff::GatedAction;
use domain::models::ticket::{TicketFormat, TicketResponse};
use domain::services::{bounded, AdmissionError, RequiredField, StoreError};
use serde::{Deserialize, Serialize};
use shared::pagination::{clamp_limit, decode_cursor, encode_cursor};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::StaffAccess;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Response body for an admitted registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub registration: Registration,
    pub ticket: TicketResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRegistrationsQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationListResponse {
    pub items: Vec<Registration>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    #[serde(default)]
    pub format: TicketFormat,
}

/// Submit the public registration form.
///
/// POST /api/v1/registrations
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let registration = state.admission.register(&form).await?;

    // The row is committed; a rendering failure must not turn into an error
    let qr_data_url = match state.tickets.data_url(&registration) {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::error!(
                registration_id = registration.id,
                error = %err,
                "Ticket image could not be rendered"
            );
            None
        }
    };
    let ticket = TicketResponse {
        payload: state.tickets.payload_for(&registration),
        qr_data_url,
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            registration,
            ticket,
        }),
    ))
}

/// List registrations, newest first.
///
/// GET /api/v1/admin/registrations?cursor=&limit=
pub async fn list_registrations(
    State(state): State<AppState>,
    staff: StaffAccess,
    Query(query): Query<ListRegistrationsQuery>,
) -> Result<Json<RegistrationListResponse>, ApiError> {
    staff.require(GatedAction::ListRegistrations)?;

    let after = query.cursor.as_deref().map(decode_cursor).transpose()?;
    let limit = clamp_limit(query.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);

    let page = bounded(state.store_timeout(), state.registrations.list(after, limit)).await?;

    let next_cursor = if page.has_more {
        page.items
            .last()
            .map(|last| encode_cursor(last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(RegistrationListResponse {
        items: page.items,
        next_cursor,
    }))
}

async fn find_registration(state: &AppState, id: i64) -> Result<Registration, ApiError> {
    bounded(state.store_timeout(), state.registrations.find(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Registration {} not found", id)))
}

/// GET /api/v1/admin/registrations/:registration_id
pub async fn get_registration(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(registration_id): Path<i64>,
) -> Result<Json<Registration>, ApiError> {
    staff.require(GatedAction::ViewRegistration)?;
    Ok(Json(find_registration(&state, registration_id).await?))
}

/// Edit an existing registration.
///
/// PATCH /api/v1/admin/registrations/:registration_id
pub async fn update_registration(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(registration_id): Path<i64>,
    Json(request): Json<UpdateRegistrationRequest>,
) -> Result<Json<Registration>, ApiError> {
    staff.require(GatedAction::EditRegistration)?;
    request.validate()?;
    if request.is_empty() {
        return Err(ApiError::Validation("No fields to update".to_string()));
    }

    let current = find_registration(&state, registration_id).await?;
    let updated = request.apply_to(&current);

    let blank = [
        (RequiredField::FullName, &updated.full_name),
        (RequiredField::Phone, &updated.phone),
        (RequiredField::Address, &updated.address),
    ]
    .into_iter()
    .find(|(_, value)| value.is_empty());
    if let Some((field, _)) = blank {
        return Err(AdmissionError::EmptyRequiredField(field).into());
    }

    let saved = match bounded(state.store_timeout(), state.registrations.update(&updated)).await
    {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            return Err(ApiError::NotFound(format!(
                "Registration {} not found",
                registration_id
            )))
        }
        Err(StoreError::Conflict(_)) => return Err(AdmissionError::DuplicatePhone.into()),
        Err(err) => return Err(err.into()),
    };

    info!(
        staff_id = %staff.staff_id(),
        registration_id = saved.id,
        "Registration updated"
    );
    Ok(Json(saved))
}

/// DELETE /api/v1/admin/registrations/:registration_id
pub async fn delete_registration(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(registration_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    staff.require(GatedAction::DeleteRegistration)?;

    let deleted = bounded(
        state.store_timeout(),
        state.registrations.delete(registration_id),
    )
    .await?;
    if !deleted {
        return Err(ApiError::NotFound(format!(
            "Registration {} not found",
            registration_id
        )));
    }

    info!(
        staff_id = %staff.staff_id(),
        registration_id,
        "Registration deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Set or clear the check-in flag directly from the dashboard.
///
/// PUT /api/v1/admin/registrations/:registration_id/check-in
pub async fn set_check_in(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(registration_id): Path<i64>,
    Json(request): Json<SetCheckInRequest>,
) -> Result<Json<Registration>, ApiError> {
    staff.require(GatedAction::SetCheckIn)?;

    let registration = bounded(
        state.store_timeout(),
        state
            .registrations
            .set_checked_in(registration_id, request.checked_in),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Registration {} not found", registration_id)))?;

    info!(
        staff_id = %staff.staff_id(),
        registration_id,
        checked_in = request.checked_in,
        "Check-in flag set"
    );
    Ok(Json(registration))
}

/// Render a registration's QR ticket.
///
/// GET /api/v1/admin/registrations/:registration_id/ticket?format=png|svg
pub async fn get_ticket(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(registration_id): Path<i64>,
    Query(query): Query<TicketQuery>,
) -> Result<impl IntoResponse, ApiError> {
    staff.require(GatedAction::ViewTicket)?;

    let registration = find_registration(&state, registration_id).await?;
    let image = state.tickets.encode(&registration, query.format)?;
    let extension = match image.format {
        TicketFormat::Png => "png",
        TicketFormat::Svg => "svg",
    };

    Ok((
        [
            (header::CONTENT_TYPE, image.format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"ticket-{}.{}\"", registration.id, extension),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        image.bytes,
    ))
}
