//! Registration entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: i64,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub organization: Option<String>,
    pub sponsor: Option<String>,
    pub attendance_confirmed: bool,
    pub checked_in: bool,
    pub created_at: DateTime<Utc>,
}

impl From<RegistrationEntity> for domain::models::Registration {
    fn from(entity: RegistrationEntity) -> Self {
        Self {
            id: entity.id,
            full_name: entity.full_name,
            phone: entity.phone,
            address: entity.address,
            organization: entity.organization,
            sponsor: entity.sponsor,
            attendance_confirmed: entity.attendance_confirmed,
            checked_in: entity.checked_in,
            created_at: entity.created_at,
        }
    }
}
