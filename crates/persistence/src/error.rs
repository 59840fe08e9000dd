//! Mapping of database errors onto store errors.

use domain::services::StoreError;

/// PostgreSQL SQLSTATE for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Converts a sqlx error into the store error the domain understands.
pub fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(
                db_err
                    .constraint()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| db_err.message().to_string()),
            )
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "Database error");
            StoreError::Backend(err.to_string())
        }
    }
}

/// True when the error is a unique violation on the named constraint.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_unavailable() {
        assert!(matches!(
            map_sqlx(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_row_not_found_is_backend() {
        assert!(matches!(
            map_sqlx(sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!is_unique_violation(
            &sqlx::Error::RowNotFound,
            "registrations_phone_key"
        ));
    }
}
