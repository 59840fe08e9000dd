//! In-memory implementation of the store traits.
//!
//! Used by unit and API tests. Supports injected latency and failures so
//! timeout and error paths can be exercised without a database.

use chrono::{DateTime, SubsecRound, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::store::{
    InsertOutcome, RegistrationPage, RegistrationStore, SettingsStore, StaffStore, StoreError,
};
use crate::models::registration::{NewRegistration, Registration};
use crate::models::staff::{
    NewStaff, StaffCredentials, StaffIdentity, StaffMember, StaffRole, StaffSession,
};

/// Current time at the microsecond precision PostgreSQL stores.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Default)]
struct State {
    registrations: BTreeMap<i64, Registration>,
    next_id: i64,
    registration_enabled: Option<bool>,
    staff: HashMap<Uuid, StaffCredentials>,
    role_tags: HashMap<Uuid, BTreeSet<String>>,
    sessions: HashMap<Uuid, StaffSession>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    failing: AtomicBool,
    latency_ms: AtomicUsize,
    calls: AtomicUsize,
    insert_attempts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose every call fails with `StoreError::Unavailable`.
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every call by the given duration.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as usize, Ordering::SeqCst);
    }

    /// Total number of store calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of times `insert` was invoked.
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// Inserts `count` registrations with generated phone numbers.
    pub fn seed_registrations(&self, count: usize) {
        let mut state = self.lock();
        for i in 0..count {
            let id = Self::next_id(&mut state);
            state.registrations.insert(
                id,
                Registration {
                    id,
                    full_name: format!("Seeded Attendee {}", i),
                    phone: format!("900-{:07}", i),
                    address: "Seeded".to_string(),
                    organization: None,
                    sponsor: None,
                    attendance_confirmed: true,
                    checked_in: false,
                    created_at: now(),
                },
            );
        }
    }

    /// Stores raw role tags, including ones that are not staff roles.
    pub fn set_role_tags(&self, staff_id: Uuid, tags: &[&str]) {
        let mut state = self.lock();
        state
            .role_tags
            .insert(staff_id, tags.iter().map(|t| t.to_string()).collect());
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn staff_count(&self) -> usize {
        self.lock().staff.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicked test thread must not poison the store for the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(state: &mut State) -> i64 {
        state.next_id += 1;
        state.next_id
    }

    async fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store set to fail".into()));
        }
        Ok(())
    }

    fn roles_from_tags(state: &State, staff_id: Uuid) -> BTreeSet<StaffRole> {
        state
            .role_tags
            .get(&staff_id)
            .map(|tags| StaffRole::parse_tags(tags.iter().map(String::as_str)))
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RegistrationStore for InMemoryStore {
    async fn count(&self) -> Result<i64, StoreError> {
        self.enter().await?;
        Ok(self.lock().registrations.len() as i64)
    }

    async fn checked_in_count(&self) -> Result<i64, StoreError> {
        self.enter().await?;
        Ok(self
            .lock()
            .registrations
            .values()
            .filter(|r| r.checked_in)
            .count() as i64)
    }

    async fn phone_exists(&self, phone: &str) -> Result<bool, StoreError> {
        self.enter().await?;
        Ok(self.lock().registrations.values().any(|r| r.phone == phone))
    }

    async fn insert(
        &self,
        registration: NewRegistration,
        capacity: i64,
    ) -> Result<InsertOutcome, StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;

        let mut state = self.lock();
        if state.registrations.len() as i64 >= capacity {
            return Ok(InsertOutcome::CapacityReached);
        }
        if state
            .registrations
            .values()
            .any(|r| r.phone == registration.phone)
        {
            return Ok(InsertOutcome::DuplicatePhone);
        }

        let id = Self::next_id(&mut state);
        let created = Registration {
            id,
            full_name: registration.full_name,
            phone: registration.phone,
            address: registration.address,
            organization: registration.organization,
            sponsor: registration.sponsor,
            attendance_confirmed: true,
            checked_in: false,
            created_at: now(),
        };
        state.registrations.insert(id, created.clone());
        Ok(InsertOutcome::Inserted(created))
    }

    async fn find(&self, id: i64) -> Result<Option<Registration>, StoreError> {
        self.enter().await?;
        Ok(self.lock().registrations.get(&id).cloned())
    }

    async fn list(
        &self,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> Result<RegistrationPage, StoreError> {
        self.enter().await?;
        let state = self.lock();

        let mut all: Vec<&Registration> = state
            .registrations
            .values()
            .filter(|r| match after {
                Some((ts, id)) => (r.created_at, r.id) < (ts, id),
                None => true,
            })
            .collect();
        all.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let limit = limit.max(0) as usize;
        let has_more = all.len() > limit;
        let items = all.into_iter().take(limit).cloned().collect();
        Ok(RegistrationPage { items, has_more })
    }

    async fn update(&self, registration: &Registration) -> Result<Option<Registration>, StoreError> {
        self.enter().await?;
        let mut state = self.lock();

        if !state.registrations.contains_key(&registration.id) {
            return Ok(None);
        }
        if state
            .registrations
            .values()
            .any(|r| r.id != registration.id && r.phone == registration.phone)
        {
            return Err(StoreError::Conflict("phone already registered".into()));
        }

        let Some(current) = state.registrations.get_mut(&registration.id) else {
            return Ok(None);
        };
        current.full_name = registration.full_name.clone();
        current.phone = registration.phone.clone();
        current.address = registration.address.clone();
        current.organization = registration.organization.clone();
        current.sponsor = registration.sponsor.clone();
        current.attendance_confirmed = registration.attendance_confirmed;
        Ok(Some(current.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.enter().await?;
        Ok(self.lock().registrations.remove(&id).is_some())
    }

    async fn set_checked_in(
        &self,
        id: i64,
        checked_in: bool,
    ) -> Result<Option<Registration>, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        Ok(state.registrations.get_mut(&id).map(|r| {
            r.checked_in = checked_in;
            r.clone()
        }))
    }
}

#[async_trait::async_trait]
impl SettingsStore for InMemoryStore {
    async fn registration_enabled(&self) -> Result<bool, StoreError> {
        self.enter().await?;
        Ok(self.lock().registration_enabled.unwrap_or(true))
    }

    async fn set_registration_enabled(
        &self,
        enabled: bool,
        _updated_by: Option<Uuid>,
    ) -> Result<(), StoreError> {
        self.enter().await?;
        self.lock().registration_enabled = Some(enabled);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().await
    }
}

#[async_trait::async_trait]
impl StaffStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StaffIdentity>, StoreError> {
        self.enter().await?;
        Ok(self.lock().staff.get(&id).map(|c| c.identity.clone()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<StaffCredentials>, StoreError> {
        self.enter().await?;
        let email = email.to_lowercase();
        Ok(self
            .lock()
            .staff
            .values()
            .find(|c| c.identity.email == email)
            .cloned())
    }

    async fn roles_of(&self, staff_id: Uuid) -> Result<BTreeSet<StaffRole>, StoreError> {
        self.enter().await?;
        Ok(Self::roles_from_tags(&self.lock(), staff_id))
    }

    async fn create_staff(&self, staff: NewStaff) -> Result<StaffIdentity, StoreError> {
        self.enter().await?;
        let mut state = self.lock();

        let email = staff.email.to_lowercase();
        if state.staff.values().any(|c| c.identity.email == email) {
            return Err(StoreError::Conflict("email already registered".into()));
        }

        let identity = StaffIdentity {
            id: Uuid::new_v4(),
            email,
            display_name: staff.display_name,
            created_at: now(),
        };
        state.staff.insert(
            identity.id,
            StaffCredentials {
                identity: identity.clone(),
                password_hash: staff.password_hash,
            },
        );
        let tags = staff.role.map(|r| r.to_string()).into_iter().collect();
        state.role_tags.insert(identity.id, tags);
        Ok(identity)
    }

    async fn list_staff(&self) -> Result<Vec<StaffMember>, StoreError> {
        self.enter().await?;
        let state = self.lock();
        let mut members: Vec<StaffMember> = state
            .staff
            .values()
            .map(|c| StaffMember {
                identity: c.identity.clone(),
                roles: Self::roles_from_tags(&state, c.identity.id)
                    .into_iter()
                    .collect(),
            })
            .collect();
        members.sort_by(|a, b| a.identity.created_at.cmp(&b.identity.created_at));
        Ok(members)
    }

    async fn delete_staff(&self, id: Uuid) -> Result<bool, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        let removed = state.staff.remove(&id).is_some();
        state.role_tags.remove(&id);
        state.sessions.retain(|_, s| s.staff_id != id);
        Ok(removed)
    }

    async fn add_role(
        &self,
        staff_id: Uuid,
        role: StaffRole,
        _granted_by: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        Ok(state
            .role_tags
            .entry(staff_id)
            .or_default()
            .insert(role.to_string()))
    }

    async fn remove_role(&self, staff_id: Uuid, role: StaffRole) -> Result<bool, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        Ok(state
            .role_tags
            .get_mut(&staff_id)
            .map(|tags| tags.remove(&role.to_string()))
            .unwrap_or(false))
    }

    async fn count_with_role(&self, role: StaffRole) -> Result<i64, StoreError> {
        self.enter().await?;
        let tag = role.to_string();
        Ok(self
            .lock()
            .role_tags
            .values()
            .filter(|tags| tags.contains(&tag))
            .count() as i64)
    }

    async fn create_session(&self, session: StaffSession) -> Result<(), StoreError> {
        self.enter().await?;
        self.lock().sessions.insert(session.id, session);
        Ok(())
    }

    async fn find_session_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> Result<Option<StaffSession>, StoreError> {
        self.enter().await?;
        Ok(self
            .lock()
            .sessions
            .values()
            .find(|s| s.access_token_hash == access_token_hash)
            .cloned())
    }

    async fn find_session_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> Result<Option<StaffSession>, StoreError> {
        self.enter().await?;
        Ok(self
            .lock()
            .sessions
            .values()
            .find(|s| s.refresh_token_hash == refresh_token_hash)
            .cloned())
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        access_token_hash: &str,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.enter().await?;
        let mut state = self.lock();
        Ok(match state.sessions.get_mut(&session_id) {
            Some(session) => {
                session.access_token_hash = access_token_hash.to_string();
                session.refresh_token_hash = refresh_token_hash.to_string();
                session.expires_at = expires_at;
                true
            }
            None => false,
        })
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.enter().await?;
        Ok(self.lock().sessions.remove(&session_id).is_some())
    }
}
