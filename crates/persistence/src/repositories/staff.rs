//! Staff repository: accounts, profiles, role tags and sessions.

use chrono::{DateTime, Utc};
use domain::models::staff::{
    NewStaff, StaffCredentials, StaffIdentity, StaffMember, StaffRole, StaffSession,
};
use domain::services::store::{StaffStore, StoreError};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::entities::{StaffAccountEntity, StaffRoleEntity, StaffSessionEntity};
use crate::error::map_sqlx;
use crate::metrics::QueryTimer;

const ACCOUNT_SELECT: &str = r#"
    SELECT a.id, a.email, a.password_hash, p.display_name, a.created_at
    FROM staff_accounts a
    JOIN staff_profiles p ON p.staff_id = a.id
"#;

/// Repository for staff database operations.
#[derive(Clone)]
pub struct StaffRepository {
    pool: PgPool,
}

impl StaffRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_account_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<StaffAccountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_staff_by_id");
        let result = sqlx::query_as::<_, StaffAccountEntity>(&format!(
            "{} WHERE a.id = $1",
            ACCOUNT_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_account_by_email(
        &self,
        email: &str,
    ) -> Result<Option<StaffAccountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_staff_by_email");
        let result = sqlx::query_as::<_, StaffAccountEntity>(&format!(
            "{} WHERE a.email = $1",
            ACCOUNT_SELECT
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Raw role tags, including ones that are not staff roles.
    pub async fn role_tags(&self, staff_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("get_staff_role_tags");
        let result =
            sqlx::query_scalar::<_, String>("SELECT role FROM staff_roles WHERE staff_id = $1")
                .bind(staff_id)
                .fetch_all(&self.pool)
                .await;
        timer.record();
        result
    }

    /// Creates account, profile and role in one transaction.
    pub async fn insert_staff(&self, staff: &NewStaff) -> Result<StaffAccountEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_staff");

        let mut tx = self.pool.begin().await?;

        let (id, email, created_at): (Uuid, String, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO staff_accounts (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(staff.email.to_lowercase())
        .bind(&staff.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO staff_profiles (staff_id, display_name, created_by)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(&staff.display_name)
        .bind(staff.created_by)
        .execute(&mut *tx)
        .await?;

        if let Some(role) = staff.role {
            sqlx::query(
                r#"
                INSERT INTO staff_roles (staff_id, role, granted_by)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(id)
            .bind(role.to_string())
            .bind(staff.created_by)
            .execute(&mut *tx)
            .await?;
        }

        // Dropping an uncommitted transaction rolls it back, so any `?` above
        // leaves no partial account behind.
        tx.commit().await?;
        timer.record();

        Ok(StaffAccountEntity {
            id,
            email,
            password_hash: staff.password_hash.clone(),
            display_name: staff.display_name.clone(),
            created_at,
        })
    }

    pub async fn list_accounts(&self) -> Result<Vec<StaffAccountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_staff");
        let result = sqlx::query_as::<_, StaffAccountEntity>(&format!(
            "{} ORDER BY a.created_at ASC",
            ACCOUNT_SELECT
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_role_rows(&self) -> Result<Vec<StaffRoleEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_staff_roles");
        let result =
            sqlx::query_as::<_, StaffRoleEntity>("SELECT staff_id, role FROM staff_roles")
                .fetch_all(&self.pool)
                .await;
        timer.record();
        result
    }

    pub async fn delete_account(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_staff");
        let result = sqlx::query("DELETE FROM staff_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    pub async fn insert_role(
        &self,
        staff_id: Uuid,
        role: StaffRole,
        granted_by: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("add_staff_role");
        let result = sqlx::query(
            r#"
            INSERT INTO staff_roles (staff_id, role, granted_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (staff_id, role) DO NOTHING
            "#,
        )
        .bind(staff_id)
        .bind(role.to_string())
        .bind(granted_by)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    pub async fn delete_role(&self, staff_id: Uuid, role: StaffRole) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("remove_staff_role");
        let result = sqlx::query("DELETE FROM staff_roles WHERE staff_id = $1 AND role = $2")
            .bind(staff_id)
            .bind(role.to_string())
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    pub async fn count_role(&self, role: StaffRole) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_staff_with_role");
        let result =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM staff_roles WHERE role = $1")
                .bind(role.to_string())
                .fetch_one(&self.pool)
                .await;
        timer.record();
        result
    }

    pub async fn insert_session(&self, session: &StaffSession) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("create_staff_session");
        let result = sqlx::query(
            r#"
            INSERT INTO staff_sessions (id, staff_id, access_token_hash, refresh_token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id)
        .bind(session.staff_id)
        .bind(&session.access_token_hash)
        .bind(&session.refresh_token_hash)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Finds a live session by one of its token hashes.
    async fn find_session(
        &self,
        column: &'static str,
        hash: &str,
    ) -> Result<Option<StaffSessionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_staff_session");
        let result = sqlx::query_as::<_, StaffSessionEntity>(&format!(
            r#"
            SELECT id, staff_id, access_token_hash, refresh_token_hash, expires_at
            FROM staff_sessions
            WHERE {} = $1 AND expires_at > NOW()
            "#,
            column
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn update_session_tokens(
        &self,
        session_id: Uuid,
        access_token_hash: &str,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("rotate_staff_session");
        let result = sqlx::query(
            r#"
            UPDATE staff_sessions
            SET access_token_hash = $2, refresh_token_hash = $3, expires_at = $4,
                last_activity_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(access_token_hash)
        .bind(refresh_token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    pub async fn delete_session_by_id(&self, session_id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_staff_session");
        let result = sqlx::query("DELETE FROM staff_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Removes sessions past their expiry. Returns the number deleted.
    pub async fn purge_expired_sessions(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("purge_expired_staff_sessions");
        let result = sqlx::query("DELETE FROM staff_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected())
    }
}

#[async_trait::async_trait]
impl StaffStore for StaffRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StaffIdentity>, StoreError> {
        Ok(self
            .find_account_by_id(id)
            .await
            .map_err(map_sqlx)?
            .map(|e| e.identity()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<StaffCredentials>, StoreError> {
        Ok(self
            .find_account_by_email(email)
            .await
            .map_err(map_sqlx)?
            .map(Into::into))
    }

    async fn roles_of(&self, staff_id: Uuid) -> Result<BTreeSet<StaffRole>, StoreError> {
        let tags = self.role_tags(staff_id).await.map_err(map_sqlx)?;
        Ok(StaffRole::parse_tags(tags.iter().map(String::as_str)))
    }

    async fn create_staff(&self, staff: NewStaff) -> Result<StaffIdentity, StoreError> {
        Ok(self
            .insert_staff(&staff)
            .await
            .map_err(map_sqlx)?
            .identity())
    }

    async fn list_staff(&self) -> Result<Vec<StaffMember>, StoreError> {
        let accounts = self.list_accounts().await.map_err(map_sqlx)?;
        let mut tags: HashMap<Uuid, Vec<String>> = HashMap::new();
        for row in self.list_role_rows().await.map_err(map_sqlx)? {
            tags.entry(row.staff_id).or_default().push(row.role);
        }

        Ok(accounts
            .into_iter()
            .map(|account| {
                let roles = tags
                    .get(&account.id)
                    .map(|t| StaffRole::parse_tags(t.iter().map(String::as_str)))
                    .unwrap_or_default();
                StaffMember {
                    identity: account.identity(),
                    roles: roles.into_iter().collect(),
                }
            })
            .collect())
    }

    async fn delete_staff(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delete_account(id).await.map_err(map_sqlx)
    }

    async fn add_role(
        &self,
        staff_id: Uuid,
        role: StaffRole,
        granted_by: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        self.insert_role(staff_id, role, granted_by)
            .await
            .map_err(map_sqlx)
    }

    async fn remove_role(&self, staff_id: Uuid, role: StaffRole) -> Result<bool, StoreError> {
        self.delete_role(staff_id, role).await.map_err(map_sqlx)
    }

    async fn count_with_role(&self, role: StaffRole) -> Result<i64, StoreError> {
        self.count_role(role).await.map_err(map_sqlx)
    }

    async fn create_session(&self, session: StaffSession) -> Result<(), StoreError> {
        self.insert_session(&session).await.map_err(map_sqlx)
    }

    async fn find_session_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> Result<Option<StaffSession>, StoreError> {
        Ok(self
            .find_session("access_token_hash", access_token_hash)
            .await
            .map_err(map_sqlx)?
            .map(Into::into))
    }

    async fn find_session_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> Result<Option<StaffSession>, StoreError> {
        Ok(self
            .find_session("refresh_token_hash", refresh_token_hash)
            .await
            .map_err(map_sqlx)?
            .map(Into::into))
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        access_token_hash: &str,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.update_session_tokens(session_id, access_token_hash, refresh_token_hash, expires_at)
            .await
            .map_err(map_sqlx)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.delete_session_by_id(session_id)
            .await
            .map_err(map_sqlx)
    }
}
