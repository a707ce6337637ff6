//! Scheduler and registry parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the maintenance triggers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub cleanup_interval: Duration,
    pub period_reset_interval: Duration,
    pub threshold_scan_interval: Duration,
    /// Non-terminal jobs untouched for this long are failed as stale
    pub stale_job_after: Duration,
    /// Terminal jobs are purged this long after they finished
    pub job_retention: Duration,
    /// Usage percentage that triggers the threshold alert
    pub threshold_percent: f64,
    pub lease_ttl: Duration,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            period_reset_interval: Duration::from_secs(60 * 60),
            threshold_scan_interval: Duration::from_secs(15 * 60),
            stale_job_after: Duration::from_secs(60 * 60),
            job_retention: Duration::from_secs(7 * 24 * 60 * 60),
            threshold_percent: 75.0,
            lease_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Job registry limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryParams {
    /// Pipelines allowed to run at once across all accounts
    pub max_concurrent_jobs: usize,
}

impl Default for RegistryParams {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 16,
        }
    }
}
