//! Drops rate-limit buckets for clients that have gone quiet.

use std::sync::Arc;

use super::scheduler::{Job, JobFrequency};
use crate::middleware::RateLimiterState;

pub struct RateLimitSweepJob {
    limiter: Arc<RateLimiterState>,
}

impl RateLimitSweepJob {
    pub fn new(limiter: Arc<RateLimiterState>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Job for RateLimitSweepJob {
    fn name(&self) -> &'static str {
        "rate_limit_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let remaining = self.limiter.evict_idle();
        metrics::gauge!("rate_limit_tracked_clients").set(remaining as f64);
        Ok(())
    }
}
