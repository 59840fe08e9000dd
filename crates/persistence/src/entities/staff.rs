//! Staff entities (database row mappings).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::staff::{StaffCredentials, StaffIdentity, StaffSession};

/// Staff account joined with its profile.
#[derive(Debug, Clone, FromRow)]
pub struct StaffAccountEntity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl StaffAccountEntity {
    pub fn identity(&self) -> StaffIdentity {
        StaffIdentity {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
        }
    }
}

impl From<StaffAccountEntity> for StaffCredentials {
    fn from(entity: StaffAccountEntity) -> Self {
        Self {
            identity: entity.identity(),
            password_hash: entity.password_hash,
        }
    }
}

/// Row of the staff_roles table.
#[derive(Debug, Clone, FromRow)]
pub struct StaffRoleEntity {
    pub staff_id: Uuid,
    pub role: String,
}

/// Row of the staff_sessions table.
#[derive(Debug, Clone, FromRow)]
pub struct StaffSessionEntity {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl From<StaffSessionEntity> for StaffSession {
    fn from(entity: StaffSessionEntity) -> Self {
        Self {
            id: entity.id,
            staff_id: entity.staff_id,
            access_token_hash: entity.access_token_hash,
            refresh_token_hash: entity.refresh_token_hash,
            expires_at: entity.expires_at,
        }
    }
}
