//! Creates the first super_admin on startup.
//!
//! Runs after migrations. Does nothing once any super_admin exists, so the
//! bootstrap credentials can stay in configuration without side effects.

use domain::models::staff::{NewStaff, StaffRole};
use domain::services::{StaffStore, StoreError};
use shared::password::{check_password_policy, hash_password, PasswordError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AdminBootstrapConfig;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bootstrap password rejected: {0}")]
    Password(#[from] PasswordError),
}

/// Returns the id of the staff member promoted or created, if any.
pub async fn bootstrap_super_admin(
    staff: &dyn StaffStore,
    config: &AdminBootstrapConfig,
) -> Result<Option<Uuid>, BootstrapError> {
    if !config.is_configured() {
        if !config.bootstrap_email.is_empty() {
            warn!("ER__ADMIN__BOOTSTRAP_EMAIL is set without a password; skipping bootstrap");
        }
        return Ok(None);
    }

    if staff.count_with_role(StaffRole::SuperAdmin).await? > 0 {
        info!("A super_admin already exists; skipping bootstrap");
        return Ok(None);
    }

    let email = config.bootstrap_email.trim().to_lowercase();

    if let Some(existing) = staff.find_credentials(&email).await? {
        let id = existing.identity.id;
        staff.add_role(id, StaffRole::SuperAdmin, None).await?;
        info!(staff_id = %id, "Existing staff account promoted to super_admin");
        return Ok(Some(id));
    }

    check_password_policy(&config.bootstrap_password)?;
    let identity = staff
        .create_staff(NewStaff {
            email,
            display_name: config.bootstrap_display_name.clone(),
            password_hash: hash_password(&config.bootstrap_password)?,
            role: Some(StaffRole::SuperAdmin),
            created_by: None,
        })
        .await?;

    info!(staff_id = %identity.id, email = %identity.email, "Bootstrap super_admin created");
    warn!(
        "SECURITY: change the bootstrap password after first sign-in and remove \
         ER__ADMIN__BOOTSTRAP_PASSWORD from the environment"
    );

    Ok(Some(identity.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::InMemoryStore;

    fn config(email: &str, password: &str) -> AdminBootstrapConfig {
        AdminBootstrapConfig {
            bootstrap_email: email.to_string(),
            bootstrap_password: password.to_string(),
            bootstrap_display_name: "Root".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_does_nothing() {
        let store = InMemoryStore::new();
        let result = bootstrap_super_admin(&store, &AdminBootstrapConfig::default())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.staff_count(), 0);
    }

    #[tokio::test]
    async fn test_creates_super_admin_once() {
        let store = InMemoryStore::new();
        let cfg = config("Root@Example.com", "Bootstrap-Pass-1");

        let id = bootstrap_super_admin(&store, &cfg).await.unwrap().unwrap();
        assert!(store.roles_of(id).await.unwrap().contains(&StaffRole::SuperAdmin));

        assert!(bootstrap_super_admin(&store, &cfg).await.unwrap().is_none());
        assert_eq!(store.staff_count(), 1);
    }

    #[tokio::test]
    async fn test_promotes_existing_account() {
        let store = InMemoryStore::new();
        let existing = store
            .create_staff(NewStaff {
                email: "root@example.com".to_string(),
                display_name: "Root".to_string(),
                password_hash: "hash".to_string(),
                role: None,
                created_by: None,
            })
            .await
            .unwrap();

        let id = bootstrap_super_admin(&store, &config("root@example.com", "Bootstrap-Pass-1"))
            .await
            .unwrap();
        assert_eq!(id, Some(existing.id));
        assert_eq!(store.count_with_role(StaffRole::SuperAdmin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_weak_bootstrap_password_is_rejected() {
        let store = InMemoryStore::new();
        let result = bootstrap_super_admin(&store, &config("root@example.com", "short")).await;
        assert!(matches!(result, Err(BootstrapError::Password(_))));
        assert_eq!(store.staff_count(), 0);
    }
}
