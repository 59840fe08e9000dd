//! Staff identity, role and capability models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Staff roles recognized by the access controller.
/// A staff member can hold several roles at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    SuperAdmin,
    Admin,
    RegistrationsManager,
    CheckinOperator,
}

impl StaffRole {
    /// Capabilities granted by this role.
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            StaffRole::SuperAdmin => Capability::all(),
            StaffRole::Admin => &[
                ViewDashboard,
                EditRegistrations,
                DeleteRegistrations,
                ManageSettings,
                CheckIn,
                CreateStaff,
            ],
            StaffRole::RegistrationsManager => &[
                ViewDashboard,
                EditRegistrations,
                DeleteRegistrations,
                ManageSettings,
            ],
            StaffRole::CheckinOperator => &[ViewDashboard, CheckIn],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StaffRole::SuperAdmin => "Full access including staff management",
            StaffRole::Admin => "Manage registrations, settings, check-in and create staff",
            StaffRole::RegistrationsManager => "Manage registrations and settings",
            StaffRole::CheckinOperator => "Check attendees in at the door",
        }
    }

    pub fn all() -> &'static [StaffRole] {
        &[
            StaffRole::SuperAdmin,
            StaffRole::Admin,
            StaffRole::RegistrationsManager,
            StaffRole::CheckinOperator,
        ]
    }

    /// Parses stored role tags, skipping tags that are not staff roles
    /// (such as the legacy `user` tag).
    pub fn parse_tags<'a, I>(tags: I) -> BTreeSet<StaffRole>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tags.into_iter().filter_map(|t| t.parse().ok()).collect()
    }
}

impl FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "super_admin" | "superadmin" => Ok(StaffRole::SuperAdmin),
            "admin" => Ok(StaffRole::Admin),
            "registrations_manager" => Ok(StaffRole::RegistrationsManager),
            "checkin_operator" => Ok(StaffRole::CheckinOperator),
            _ => Err(format!("Unknown staff role: {}", s)),
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaffRole::SuperAdmin => write!(f, "super_admin"),
            StaffRole::Admin => write!(f, "admin"),
            StaffRole::RegistrationsManager => write!(f, "registrations_manager"),
            StaffRole::CheckinOperator => write!(f, "checkin_operator"),
        }
    }
}

/// A single permitted action class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewDashboard,
    EditRegistrations,
    DeleteRegistrations,
    ManageSettings,
    CheckIn,
    CreateStaff,
    ManageStaff,
}

impl Capability {
    pub fn all() -> &'static [Capability] {
        &[
            Capability::ViewDashboard,
            Capability::EditRegistrations,
            Capability::DeleteRegistrations,
            Capability::ManageSettings,
            Capability::CheckIn,
            Capability::CreateStaff,
            Capability::ManageStaff,
        ]
    }
}

/// Union of the capabilities of a set of roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn from_roles<'a, I>(roles: I) -> Self
    where
        I: IntoIterator<Item = &'a StaffRole>,
    {
        Self(
            roles
                .into_iter()
                .flat_map(|r| r.capabilities().iter().copied())
                .collect(),
        )
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

/// Every action the dashboard gates, each with the capability it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    ViewStats,
    ListRegistrations,
    ViewRegistration,
    ViewTicket,
    EditRegistration,
    DeleteRegistration,
    SetCheckIn,
    RunScanner,
    ViewSettings,
    ToggleRegistration,
    ListRoles,
    CreateStaff,
    ListStaff,
    DeleteStaff,
    ChangeStaffRoles,
}

impl GatedAction {
    pub const fn required(&self) -> Capability {
        match self {
            GatedAction::ViewStats
            | GatedAction::ListRegistrations
            | GatedAction::ViewRegistration
            | GatedAction::ViewTicket
            | GatedAction::ViewSettings
            | GatedAction::ListRoles => Capability::ViewDashboard,
            GatedAction::EditRegistration => Capability::EditRegistrations,
            GatedAction::DeleteRegistration => Capability::DeleteRegistrations,
            GatedAction::ToggleRegistration => Capability::ManageSettings,
            GatedAction::SetCheckIn | GatedAction::RunScanner => Capability::CheckIn,
            GatedAction::CreateStaff => Capability::CreateStaff,
            GatedAction::ListStaff | GatedAction::DeleteStaff | GatedAction::ChangeStaffRoles => {
                Capability::ManageStaff
            }
        }
    }
}

/// An authenticated staff account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffIdentity {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Staff account together with its stored credential.
#[derive(Debug, Clone)]
pub struct StaffCredentials {
    pub identity: StaffIdentity,
    pub password_hash: String,
}

/// Staff listing entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    #[serde(flatten)]
    pub identity: StaffIdentity,
    pub roles: Vec<StaffRole>,
}

/// Data needed to create a staff account.
#[derive(Debug, Clone)]
pub struct NewStaff {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Option<StaffRole>,
    pub created_by: Option<Uuid>,
}

/// Server-side record of a signed-in session.
#[derive(Debug, Clone)]
pub struct StaffSession {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Request body for creating a staff account from the dashboard.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be between 1 and 100 characters"))]
    pub display_name: String,

    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,

    pub role: StaffRole,
}

/// Request body for self sign-up.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be between 1 and 100 characters"))]
    pub display_name: String,

    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRoleRequest {
    pub role: StaffRole,
}

/// Role catalogue entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInfo {
    pub role: StaffRole,
    pub description: String,
    pub capabilities: Vec<Capability>,
}

impl From<StaffRole> for RoleInfo {
    fn from(role: StaffRole) -> Self {
        Self {
            role,
            description: role.description().to_string(),
            capabilities: role.capabilities().to_vec(),
        }
    }
}
