//! Maintenance scheduler configuration from TOML (`[scheduler]` section)

use crate::config::validation::{ConfigIssue, ConfigIssueCode};
use consensus_application::SchedulerParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSchedulerConfig {
    /// Run the maintenance triggers in this process
    pub enabled: bool,
    pub cleanup_interval_secs: u64,
    pub period_reset_interval_secs: u64,
    pub threshold_scan_interval_secs: u64,
    pub stale_job_after_secs: u64,
    pub job_retention_secs: u64,
    /// Usage percentage that triggers the threshold alert
    pub threshold_percent: f64,
    pub lease_ttl_secs: u64,
}

impl Default for FileSchedulerConfig {
    fn default() -> Self {
        let params = SchedulerParams::default();
        Self {
            enabled: true,
            cleanup_interval_secs: params.cleanup_interval.as_secs(),
            period_reset_interval_secs: params.period_reset_interval.as_secs(),
            threshold_scan_interval_secs: params.threshold_scan_interval.as_secs(),
            stale_job_after_secs: params.stale_job_after.as_secs(),
            job_retention_secs: params.job_retention.as_secs(),
            threshold_percent: params.threshold_percent,
            lease_ttl_secs: params.lease_ttl.as_secs(),
        }
    }
}

impl FileSchedulerConfig {
    pub fn to_params(&self) -> (SchedulerParams, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let defaults = SchedulerParams::default();

        let mut seconds = |field: &str, value: u64, fallback: Duration| {
            if value == 0 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::InvalidValue {
                        field: format!("scheduler.{field}"),
                        value: "0".to_string(),
                    },
                    format!(
                        "scheduler.{field}: must be positive, using {}",
                        fallback.as_secs()
                    ),
                ));
                fallback
            } else {
                Duration::from_secs(value)
            }
        };

        let mut params = SchedulerParams {
            cleanup_interval: seconds(
                "cleanup_interval_secs",
                self.cleanup_interval_secs,
                defaults.cleanup_interval,
            ),
            period_reset_interval: seconds(
                "period_reset_interval_secs",
                self.period_reset_interval_secs,
                defaults.period_reset_interval,
            ),
            threshold_scan_interval: seconds(
                "threshold_scan_interval_secs",
                self.threshold_scan_interval_secs,
                defaults.threshold_scan_interval,
            ),
            stale_job_after: seconds(
                "stale_job_after_secs",
                self.stale_job_after_secs,
                defaults.stale_job_after,
            ),
            job_retention: seconds(
                "job_retention_secs",
                self.job_retention_secs,
                defaults.job_retention,
            ),
            threshold_percent: self.threshold_percent,
            lease_ttl: seconds("lease_ttl_secs", self.lease_ttl_secs, defaults.lease_ttl),
        };

        if !(self.threshold_percent > 0.0 && self.threshold_percent <= 100.0) {
            params.threshold_percent = defaults.threshold_percent;
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: "scheduler.threshold_percent".to_string(),
                    value: self.threshold_percent.to_string(),
                },
                format!(
                    "scheduler.threshold_percent: must be in (0, 100], using {}",
                    defaults.threshold_percent
                ),
            ));
        }

        (params, issues)
    }
}
