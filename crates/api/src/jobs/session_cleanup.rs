//! Deletes staff sessions whose refresh window has passed.

use persistence::repositories::StaffRepository;

use super::scheduler::{Job, JobFrequency};

pub struct SessionCleanupJob {
    staff: StaffRepository,
}

impl SessionCleanupJob {
    pub fn new(staff: StaffRepository) -> Self {
        Self { staff }
    }
}

#[async_trait::async_trait]
impl Job for SessionCleanupJob {
    fn name(&self) -> &'static str {
        "session_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let purged = self
            .staff
            .purge_expired_sessions()
            .await
            .map_err(|e| format!("Failed to purge expired sessions: {}", e))?;

        if purged > 0 {
            tracing::info!(purged, "Expired staff sessions removed");
        }
        Ok(())
    }
}
