//! Background job scheduler and job implementations.

mod pool_metrics;
mod rate_limit_sweep;
mod scanner_reaper;
mod scheduler;
mod session_cleanup;

pub use pool_metrics::PoolMetricsJob;
pub use rate_limit_sweep::RateLimitSweepJob;
pub use scanner_reaper::ScannerReaperJob;
pub use scheduler::{run_once, Job, JobFrequency, JobScheduler};
pub use session_cleanup::SessionCleanupJob;
