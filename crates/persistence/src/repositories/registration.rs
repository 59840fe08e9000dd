//! Registration repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::registration::{NewRegistration, Registration};
use domain::services::store::{InsertOutcome, RegistrationPage, RegistrationStore, StoreError};
use sqlx::PgPool;

use crate::entities::RegistrationEntity;
use crate::error::{is_unique_violation, map_sqlx};
use crate::metrics::QueryTimer;

/// Advisory lock key serializing registration inserts.
const ADMISSION_LOCK_KEY: i64 = 0x5245_4749_5354; // "REGIST"

const PHONE_CONSTRAINT: &str = "registrations_phone_key";

const REGISTRATION_COLUMNS: &str = "id, full_name, phone, address, organization, sponsor, \
     attendance_confirmed, checked_in, created_at";

/// Repository for registration database operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn count_all(&self) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_registrations");
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registrations")
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result
    }

    pub async fn count_checked_in(&self) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_checked_in_registrations");
        let result =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registrations WHERE checked_in")
                .fetch_one(&self.pool)
                .await;
        timer.record();
        result
    }

    pub async fn exists_by_phone(&self, phone: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("exists_registration_by_phone");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM registrations WHERE phone = $1)",
        )
        .bind(phone)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Inserts under a transaction-scoped advisory lock so the capacity and
    /// phone checks cannot interleave with another insert.
    pub async fn insert_guarded(
        &self,
        registration: &NewRegistration,
        capacity: i64,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let timer = QueryTimer::new("insert_registration");

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ADMISSION_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registrations")
            .fetch_one(&mut *tx)
            .await?;
        if count >= capacity {
            tx.rollback().await?;
            timer.record();
            return Ok(InsertOutcome::CapacityReached);
        }

        let inserted = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            INSERT INTO registrations (full_name, phone, address, organization, sponsor, attendance_confirmed)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(&registration.full_name)
        .bind(&registration.phone)
        .bind(&registration.address)
        .bind(&registration.organization)
        .bind(&registration.sponsor)
        .fetch_one(&mut *tx)
        .await;

        let outcome = match inserted {
            Ok(entity) => {
                tx.commit().await?;
                InsertOutcome::Inserted(entity.into())
            }
            Err(err) if is_unique_violation(&err, PHONE_CONSTRAINT) => {
                tx.rollback().await?;
                InsertOutcome::DuplicatePhone
            }
            Err(err) => return Err(err),
        };

        timer.record();
        Ok(outcome)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_id");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "SELECT {} FROM registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Newest first, keyed on `(created_at, id)`.
    pub async fn list_before(
        &self,
        cursor: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_registrations");
        let (created_at, id) = match cursor {
            Some((ts, id)) => (Some(ts), Some(id)),
            None => (None, None),
        };

        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            SELECT {}
            FROM registrations
            WHERE ($1::TIMESTAMPTZ IS NULL OR (created_at, id) < ($1, $2))
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(created_at)
        .bind(id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn update_fields(
        &self,
        registration: &Registration,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            r#"
            UPDATE registrations
            SET full_name = $2, phone = $3, address = $4, organization = $5,
                sponsor = $6, attendance_confirmed = $7
            WHERE id = $1
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(registration.id)
        .bind(&registration.full_name)
        .bind(&registration.phone)
        .bind(&registration.address)
        .bind(&registration.organization)
        .bind(&registration.sponsor)
        .bind(registration.attendance_confirmed)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_registration");
        let result = sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    pub async fn update_checked_in(
        &self,
        id: i64,
        checked_in: bool,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_registration_checked_in");
        let result = sqlx::query_as::<_, RegistrationEntity>(&format!(
            "UPDATE registrations SET checked_in = $2 WHERE id = $1 RETURNING {}",
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .bind(checked_in)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}

#[async_trait::async_trait]
impl RegistrationStore for RegistrationRepository {
    async fn count(&self) -> Result<i64, StoreError> {
        self.count_all().await.map_err(map_sqlx)
    }

    async fn checked_in_count(&self) -> Result<i64, StoreError> {
        self.count_checked_in().await.map_err(map_sqlx)
    }

    async fn phone_exists(&self, phone: &str) -> Result<bool, StoreError> {
        self.exists_by_phone(phone).await.map_err(map_sqlx)
    }

    async fn insert(
        &self,
        registration: NewRegistration,
        capacity: i64,
    ) -> Result<InsertOutcome, StoreError> {
        self.insert_guarded(&registration, capacity)
            .await
            .map_err(map_sqlx)
    }

    async fn find(&self, id: i64) -> Result<Option<Registration>, StoreError> {
        Ok(self.find_by_id(id).await.map_err(map_sqlx)?.map(Into::into))
    }

    async fn list(
        &self,
        after: Option<(DateTime<Utc>, i64)>,
        limit: i64,
    ) -> Result<RegistrationPage, StoreError> {
        let mut rows = self
            .list_before(after, limit + 1)
            .await
            .map_err(map_sqlx)?;
        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit.max(0) as usize);
        Ok(RegistrationPage {
            items: rows.into_iter().map(Into::into).collect(),
            has_more,
        })
    }

    async fn update(&self, registration: &Registration) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .update_fields(registration)
            .await
            .map_err(map_sqlx)?
            .map(Into::into))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.delete_by_id(id).await.map_err(map_sqlx)
    }

    async fn set_checked_in(
        &self,
        id: i64,
        checked_in: bool,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .update_checked_in(id, checked_in)
            .await
            .map_err(map_sqlx)?
            .map(Into::into))
    }
}
