//! Staff management: role catalogue, staff accounts and role grants.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::staff::{
    AddRoleRequest, CreateStaffRequest, GatedAction, NewStaff, RoleInfo, StaffMember, StaffRole,
};
use domain::services::{bounded, StoreError};
use serde::Serialize;
use shared::password::{check_password_policy, hash_password};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::StaffAccess;

/// Roles held by one staff member after a change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRolesResponse {
    pub staff_id: Uuid,
    pub roles: Vec<StaffRole>,
}

async fn roles_response(state: &AppState, staff_id: Uuid) -> Result<StaffRolesResponse, ApiError> {
    let roles = bounded(state.store_timeout(), state.staff.roles_of(staff_id)).await?;
    Ok(StaffRolesResponse {
        staff_id,
        roles: roles.into_iter().collect(),
    })
}

async fn ensure_staff_exists(state: &AppState, staff_id: Uuid) -> Result<(), ApiError> {
    bounded(state.store_timeout(), state.staff.find_by_id(staff_id))
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound("Staff member not found".to_string()))
}

/// Fails if `staff_id` is the only remaining super_admin.
async fn ensure_not_last_super_admin(state: &AppState, staff_id: Uuid) -> Result<(), ApiError> {
    let timeout = state.store_timeout();
    let roles = bounded(timeout, state.staff.roles_of(staff_id)).await?;
    if !roles.contains(&StaffRole::SuperAdmin) {
        return Ok(());
    }
    let super_admins = bounded(timeout, state.staff.count_with_role(StaffRole::SuperAdmin)).await?;
    if super_admins <= 1 {
        return Err(ApiError::Conflict(
            "The last super_admin cannot be removed".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/v1/admin/roles
pub async fn list_roles(staff: StaffAccess) -> Result<Json<Vec<RoleInfo>>, ApiError> {
    staff.require(GatedAction::ListRoles)?;
    Ok(Json(
        StaffRole::all().iter().copied().map(RoleInfo::from).collect(),
    ))
}

/// GET /api/v1/admin/staff
pub async fn list_staff(
    State(state): State<AppState>,
    staff: StaffAccess,
) -> Result<Json<Vec<StaffMember>>, ApiError> {
    staff.require(GatedAction::ListStaff)?;
    let members = bounded(state.store_timeout(), state.staff.list_staff()).await?;
    Ok(Json(members))
}

/// Create a staff account with one role.
///
/// The identity, profile and role are written together; nothing is kept if
/// any part fails.
///
/// POST /api/v1/admin/staff
pub async fn create_staff(
    State(state): State<AppState>,
    staff: StaffAccess,
    Json(request): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<StaffMember>), ApiError> {
    staff.require(GatedAction::CreateStaff)?;
    request.validate()?;

    if request.role == StaffRole::SuperAdmin && !staff.has_role(StaffRole::SuperAdmin) {
        return Err(ApiError::Forbidden(
            "Only a super_admin can create another super_admin".to_string(),
        ));
    }

    check_password_policy(&request.password)?;
    let password_hash = hash_password(&request.password)?;

    let created = bounded(
        state.store_timeout(),
        state.staff.create_staff(NewStaff {
            email: request.email.trim().to_lowercase(),
            display_name: request.display_name.trim().to_string(),
            password_hash,
            role: Some(request.role),
            created_by: Some(staff.staff_id()),
        }),
    )
    .await;

    let identity = match created {
        Ok(identity) => identity,
        Err(StoreError::Conflict(_)) => {
            return Err(ApiError::Conflict("Email already registered".to_string()))
        }
        Err(err) => return Err(err.into()),
    };

    info!(
        created_by = %staff.staff_id(),
        staff_id = %identity.id,
        role = %request.role,
        "Staff account created"
    );

    Ok((
        StatusCode::CREATED,
        Json(StaffMember {
            identity,
            roles: vec![request.role],
        }),
    ))
}

/// DELETE /api/v1/admin/staff/:staff_id
pub async fn delete_staff(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(staff_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    staff.require(GatedAction::DeleteStaff)?;

    if staff_id == staff.staff_id() {
        return Err(ApiError::Conflict(
            "You cannot delete your own account".to_string(),
        ));
    }
    ensure_not_last_super_admin(&state, staff_id).await?;

    let deleted = bounded(state.store_timeout(), state.staff.delete_staff(staff_id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("Staff member not found".to_string()));
    }

    info!(deleted_by = %staff.staff_id(), staff_id = %staff_id, "Staff account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Grant a role.
///
/// POST /api/v1/admin/staff/:staff_id/roles
pub async fn add_role(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path(staff_id): Path<Uuid>,
    Json(request): Json<AddRoleRequest>,
) -> Result<Json<StaffRolesResponse>, ApiError> {
    staff.require(GatedAction::ChangeStaffRoles)?;
    ensure_staff_exists(&state, staff_id).await?;

    let added = bounded(
        state.store_timeout(),
        state
            .staff
            .add_role(staff_id, request.role, Some(staff.staff_id())),
    )
    .await?;

    if added {
        info!(
            granted_by = %staff.staff_id(),
            staff_id = %staff_id,
            role = %request.role,
            "Staff role granted"
        );
    }
    Ok(Json(roles_response(&state, staff_id).await?))
}

/// Revoke a role.
///
/// DELETE /api/v1/admin/staff/:staff_id/roles/:role
pub async fn remove_role(
    State(state): State<AppState>,
    staff: StaffAccess,
    Path((staff_id, role)): Path<(Uuid, String)>,
) -> Result<Json<StaffRolesResponse>, ApiError> {
    staff.require(GatedAction::ChangeStaffRoles)?;

    let role: StaffRole = role
        .parse()
        .map_err(|_| ApiError::Validation(format!("Unknown role: {}", role)))?;

    if role == StaffRole::SuperAdmin {
        ensure_not_last_super_admin(&state, staff_id).await?;
    }

    let removed = bounded(state.store_timeout(), state.staff.remove_role(staff_id, role)).await?;
    if !removed {
        return Err(ApiError::NotFound(
            "Staff member does not hold this role".to_string(),
        ));
    }

    info!(
        revoked_by = %staff.staff_id(),
        staff_id = %staff_id,
        role = %role,
        "Staff role revoked"
    );
    Ok(Json(roles_response(&state, staff_id).await?))
}
