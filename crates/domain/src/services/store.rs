//! Store traits the core services depend on.
//!
//! PostgreSQL repositories implement these in the persistence crate;
//! [`super::memory::InMemoryStore`] implements them for tests.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::registration::{NewRegistration, Registration};
use crate::models::staff::{
    NewStaff, StaffCredentials, StaffIdentity, StaffMember, StaffRole, StaffSession,
};

/// Failure reported by a backing store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within its time bound.
    #[error("Store call timed out after {0} ms")]
    Timeout(u64),

    #[error("Store error: {0}")]
    Backend(String),
}

/// Runs a store call with an upper time bound.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit.as_millis() as u64))?
}

/// Outcome of an insert that re-checks capacity and uniqueness atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Registration),
    CapacityReached,
    DuplicatePhone,
}

/// One page of registrations, newest first.
#[derive(Debug, Clone)]
pub struct RegistrationPage {
    pub items: Vec<Registration>,
    pub has_more: bool,
}

#[async_trait::async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn count(&self) -> Result<i64, StoreError>;

    async fn checked_in_count(&self) -> Result<i64, StoreError>;

    async fn phone_exists(&self, phone: &str) -> Result<bool, StoreError>;

    /// Inserts a registration unless the event is full or the phone is taken.
    /// Both conditions are re-checked inside the same atomic unit as the insert.
    async fn insert(
        &self,
        registration: NewRegistration,
        capacity: i64,
    ) -> Result<InsertOutcome, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<Registration>, StoreError>;

    /// Lists registrations older than the `(created_at, id)` cursor.
    async fn list(
        &self,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> Result<RegistrationPage, StoreError>;

    /// Replaces the editable fields. Returns `None` if the id does not exist.
    async fn update(&self, registration: &Registration) -> Result<Option<Registration>, StoreError>;

    /// Returns `false` if the id does not exist.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Sets the check-in flag. Returns `None` if the id does not exist.
    async fn set_checked_in(
        &self,
        id: i64,
        checked_in: bool,
    ) -> Result<Option<Registration>, StoreError>;
}

#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current value of the registration switch; an absent row reads as enabled.
    async fn registration_enabled(&self) -> Result<bool, StoreError>;

    async fn set_registration_enabled(
        &self,
        enabled: bool,
        updated_by: Option<Uuid>,
    ) -> Result<(), StoreError>;

    /// Cheap round-trip used by readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait StaffStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StaffIdentity>, StoreError>;

    /// Looks up by lower-cased email, returning the stored password hash too.
    async fn find_credentials(&self, email: &str) -> Result<Option<StaffCredentials>, StoreError>;

    /// Recognized roles of a staff member. Unknown stored tags are skipped.
    async fn roles_of(&self, staff_id: Uuid) -> Result<BTreeSet<StaffRole>, StoreError>;

    /// Creates the identity, its profile and optional role as one unit.
    /// Nothing is left behind if any part fails.
    async fn create_staff(&self, staff: NewStaff) -> Result<StaffIdentity, StoreError>;

    async fn list_staff(&self) -> Result<Vec<StaffMember>, StoreError>;

    async fn delete_staff(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Returns `false` if the staff member already held the role.
    async fn add_role(
        &self,
        staff_id: Uuid,
        role: StaffRole,
        granted_by: Option<Uuid>,
    ) -> Result<bool, StoreError>;

    /// Returns `false` if the staff member did not hold the role.
    async fn remove_role(&self, staff_id: Uuid, role: StaffRole) -> Result<bool, StoreError>;

    async fn count_with_role(&self, role: StaffRole) -> Result<i64, StoreError>;

    async fn create_session(&self, session: StaffSession) -> Result<(), StoreError>;

    async fn find_session_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> Result<Option<StaffSession>, StoreError>;

    async fn find_session_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> Result<Option<StaffSession>, StoreError>;

    /// Replaces both token hashes of a session (refresh rotation).
    async fn rotate_session(
        &self,
        session_id: Uuid,
        access_token_hash: &str,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError>;
}
