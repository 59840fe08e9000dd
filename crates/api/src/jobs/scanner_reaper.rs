//! Releases cameras held by check-in sessions nobody is using.

use std::sync::Arc;

use super::scheduler::{Job, JobFrequency};
use crate::services::ScannerRegistry;

pub struct ScannerReaperJob {
    scanners: Arc<ScannerRegistry>,
}

impl ScannerReaperJob {
    pub fn new(scanners: Arc<ScannerRegistry>) -> Self {
        Self { scanners }
    }
}

#[async_trait::async_trait]
impl Job for ScannerReaperJob {
    fn name(&self) -> &'static str {
        "scanner_reaper"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let closed = self.scanners.reap_idle().await;
        metrics::gauge!("checkin_sessions_active").set(self.scanners.session_count() as f64);
        if closed > 0 {
            tracing::info!(closed, "Idle check-in sessions closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::InMemoryStore;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_reaper_closes_idle_sessions() {
        let scanners = Arc::new(ScannerRegistry::new(
            Arc::new(InMemoryStore::new()),
            Duration::from_secs(1),
            Duration::ZERO,
        ));
        scanners.open(Uuid::new_v4(), "door-1").await.unwrap();

        let job = ScannerReaperJob::new(scanners.clone());
        job.execute().await.unwrap();

        assert_eq!(scanners.session_count(), 0);
    }
}
