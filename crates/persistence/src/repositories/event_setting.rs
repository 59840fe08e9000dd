//! Event settings repository.

use domain::models::event_setting::{format_flag, parse_flag, REGISTRATION_ENABLED_KEY};
use domain::services::store::{SettingsStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::map_sqlx;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct EventSettingRepository {
    pool: PgPool,
}

impl EventSettingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let timer = QueryTimer::new("get_event_setting");
        let result =
            sqlx::query_scalar::<_, String>("SELECT value FROM event_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await;
        timer.record();
        result
    }

    pub async fn upsert(
        &self,
        key: &str,
        value: &str,
        updated_by: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("upsert_event_setting");
        let result = sqlx::query(
            r#"
            INSERT INTO event_settings (key, value, updated_at, updated_by)
            VALUES ($1, $2, NOW(), $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW(), updated_by = EXCLUDED.updated_by
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_by)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }
}

#[async_trait::async_trait]
impl SettingsStore for EventSettingRepository {
    async fn registration_enabled(&self) -> Result<bool, StoreError> {
        Ok(self
            .get(REGISTRATION_ENABLED_KEY)
            .await
            .map_err(map_sqlx)?
            .map(|v| parse_flag(&v))
            .unwrap_or(true))
    }

    async fn set_registration_enabled(
        &self,
        enabled: bool,
        updated_by: Option<Uuid>,
    ) -> Result<(), StoreError> {
        self.upsert(REGISTRATION_ENABLED_KEY, format_flag(enabled), updated_by)
            .await
            .map_err(map_sqlx)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }
}
