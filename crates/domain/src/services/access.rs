//! Role-gated access control for the staff dashboard.
//!
//! Access is resolved from the role store on every request. Nothing is
//! cached, so role changes and sign-outs apply to the next request.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::store::{bounded, StaffStore, StoreError};
use crate::models::staff::{Capability, CapabilitySet, GatedAction, StaffIdentity, StaffRole};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("Account has no staff role")]
    NoRoles,

    #[error("Missing capability: {0:?}")]
    MissingCapability(Capability),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Staff account not found")]
    UnknownStaff,

    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an authenticated staff member may do.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLevel {
    pub staff: StaffIdentity,
    pub roles: BTreeSet<StaffRole>,
    pub capabilities: CapabilitySet,
}

impl AccessLevel {
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn has_role(&self, role: StaffRole) -> bool {
        self.roles.contains(&role)
    }

    /// Checks that the capability an action needs is present.
    pub fn require(&self, action: GatedAction) -> Result<(), AccessDenied> {
        let required = action.required();
        if self.can(required) {
            Ok(())
        } else {
            Err(AccessDenied::MissingCapability(required))
        }
    }
}

/// Maps an identity and its recognized roles to an access level.
/// An identity without roles is denied.
pub fn resolve_access(
    staff: StaffIdentity,
    roles: BTreeSet<StaffRole>,
) -> Result<AccessLevel, AccessDenied> {
    if roles.is_empty() {
        return Err(AccessDenied::NoRoles);
    }
    let capabilities = CapabilitySet::from_roles(&roles);
    Ok(AccessLevel {
        staff,
        roles,
        capabilities,
    })
}

/// Loads identities and roles from the staff store.
#[derive(Clone)]
pub struct AccessController {
    staff: Arc<dyn StaffStore>,
    store_timeout: Duration,
}

impl AccessController {
    pub fn new(staff: Arc<dyn StaffStore>, store_timeout: Duration) -> Self {
        Self {
            staff,
            store_timeout,
        }
    }

    pub async fn resolve(&self, staff_id: Uuid) -> Result<AccessLevel, AccessError> {
        let identity = bounded(self.store_timeout, self.staff.find_by_id(staff_id))
            .await?
            .ok_or(AccessError::UnknownStaff)?;
        let roles = bounded(self.store_timeout, self.staff.roles_of(staff_id)).await?;
        Ok(resolve_access(identity, roles)?)
    }
}
