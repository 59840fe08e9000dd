//! Dashboard counters and the registration switch.

use axum::{extract::State, Json};
use domain::models::registration::RegistrationStats;
use domain::models::staff::GatedAction;
use domain::models::RegistrationSwitch;
use domain::services::bounded;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::StaffAccess;

/// GET /api/v1/admin/stats
pub async fn get_stats(
    State(state): State<AppState>,
    staff: StaffAccess,
) -> Result<Json<RegistrationStats>, ApiError> {
    staff.require(GatedAction::ViewStats)?;

    let timeout = state.store_timeout();
    let (total, checked_in, enabled) = tokio::try_join!(
        bounded(timeout, state.registrations.count()),
        bounded(timeout, state.registrations.checked_in_count()),
        bounded(timeout, state.settings.registration_enabled()),
    )?;

    Ok(Json(RegistrationStats::new(
        total,
        checked_in,
        state.admission.capacity(),
        enabled,
    )))
}

/// GET /api/v1/admin/settings/registration-enabled
pub async fn get_registration_switch(
    State(state): State<AppState>,
    staff: StaffAccess,
) -> Result<Json<RegistrationSwitch>, ApiError> {
    staff.require(GatedAction::ViewSettings)?;

    let enabled = bounded(state.store_timeout(), state.settings.registration_enabled()).await?;
    Ok(Json(RegistrationSwitch { enabled }))
}

/// Open or close public registration.
///
/// PUT /api/v1/admin/settings/registration-enabled
pub async fn set_registration_switch(
    State(state): State<AppState>,
    staff: StaffAccess,
    Json(request): Json<RegistrationSwitch>,
) -> Result<Json<RegistrationSwitch>, ApiError> {
    staff.require(GatedAction::ToggleRegistration)?;

    bounded(
        state.store_timeout(),
        state
            .settings
            .set_registration_enabled(request.enabled, Some(staff.staff_id())),
    )
    .await?;

    info!(
        staff_id = %staff.staff_id(),
        enabled = request.enabled,
        "Registration switch changed"
    );
    Ok(Json(request))
}
