//! Maintenance scheduler
//!
//! Three independent triggers, each driven by its own interval ticker:
//!
//! - **cleanup** fails jobs stuck in a non-terminal state and purges old ones
//! - **period reset** rolls accounts whose billing period has ended
//! - **threshold scan** alerts accounts nearing or exceeding their allowance
//!
//! Every trigger takes a lease keyed by (trigger, scope) before it does any
//! work. A held lease means another run is in progress and this one is
//! skipped rather than queued. All usage writes go through the ledger.

use crate::config::SchedulerParams;
use crate::ports::lease::{LeaseKey, LeaseManager};
use crate::ports::notifier::{
    Notification, Notifier, TEMPLATE_PERIOD_RESET, TEMPLATE_USAGE_OVERAGE,
    TEMPLATE_USAGE_THRESHOLD,
};
use crate::ports::repository::{JobRepository, RepositoryError};
use crate::use_cases::usage_ledger::{LedgerError, UsageFlag, UsageLedger};
use chrono::{DateTime, Utc};
use consensus_domain::{Account, FailureCode, FailureReason, UsageSummary};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CLEANUP: &str = "cleanup";
const PERIOD_RESET: &str = "period-reset";
const THRESHOLD_SCAN: &str = "threshold-scan";

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What one cleanup run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub stale_failed: usize,
    pub purged: usize,
    /// The run was skipped because another one held the lease
    pub skipped: bool,
}

pub struct MaintenanceScheduler {
    jobs: Arc<dyn JobRepository>,
    ledger: Arc<UsageLedger>,
    notifier: Arc<dyn Notifier>,
    leases: Arc<dyn LeaseManager>,
    params: SchedulerParams,
}

impl MaintenanceScheduler {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        ledger: Arc<UsageLedger>,
        notifier: Arc<dyn Notifier>,
        leases: Arc<dyn LeaseManager>,
        params: SchedulerParams,
    ) -> Self {
        Self {
            jobs,
            ledger,
            notifier,
            leases,
            params,
        }
    }

    /// Fail stale jobs and purge expired ones.
    pub async fn run_cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport, SchedulerError> {
        let key = LeaseKey::new(CLEANUP, "global");
        let Some(token) = self.leases.try_acquire(&key, self.params.lease_ttl, now).await else {
            debug!(lease = %key, "Cleanup already running, skipping");
            return Ok(CleanupReport {
                skipped: true,
                ..Default::default()
            });
        };

        let result = self.cleanup(now).await;
        self.leases.release(&key, token).await;
        result
    }

    async fn cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport, SchedulerError> {
        let mut report = CleanupReport::default();

        let stale_cutoff = now - chrono_duration(self.params.stale_job_after);
        for job_id in self.jobs.stale_jobs(stale_cutoff).await? {
            let reason = FailureReason::new(
                FailureCode::Stale,
                None,
                format!("no progress for {:?}", self.params.stale_job_after),
            );
            let job = match self
                .jobs
                .update(job_id, Box::new(move |job| job.fail(reason, now).map(|_| ())))
                .await
            {
                Ok(job) => job,
                // finished between listing and update
                Err(RepositoryError::Domain(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            let tokens = job.actual_tokens().unwrap_or_default();
            self.ledger.consume(job.account_id(), tokens, now).await?;
            warn!(job_id = %job_id, tokens, "Failed stale job");
            report.stale_failed += 1;
        }

        let retention_cutoff = now - chrono_duration(self.params.job_retention);
        report.purged = self.jobs.purge_finished(retention_cutoff).await?;

        info!(
            stale_failed = report.stale_failed,
            purged = report.purged,
            "Cleanup finished"
        );
        Ok(report)
    }

    /// Roll every account whose billing period has ended. Returns how many
    /// accounts were reset by this run.
    ///
    /// An account that cannot be reset is logged and left for the next run;
    /// it never holds up the others.
    pub async fn run_period_reset(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let mut reset = 0;
        let mut failed = 0;
        for account in self.ledger.accounts().await? {
            if !account.period_elapsed(now) {
                continue;
            }
            let key = LeaseKey::new(PERIOD_RESET, account.id.as_str());
            let Some(token) = self.leases.try_acquire(&key, self.params.lease_ttl, now).await
            else {
                debug!(lease = %key, "Period reset already running, skipping");
                continue;
            };

            let result = self.ledger.reset_period(&account.id, now).await;
            self.leases.release(&key, token).await;

            match result {
                Ok(Some(summary)) => {
                    self.notify(&account, TEMPLATE_PERIOD_RESET, summary).await;
                    reset += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(account = %account.id, error = %e, "Period reset failed for account");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            warn!(reset, failed, "Period reset finished with errors");
        }
        Ok(reset)
    }

    /// Send threshold and overage alerts, each at most once per period.
    /// Returns the number of notifications sent.
    pub async fn run_threshold_scan(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let mut sent = 0;
        let mut failed = 0;
        for account in self.ledger.accounts().await? {
            let key = LeaseKey::new(THRESHOLD_SCAN, account.id.as_str());
            let Some(token) = self.leases.try_acquire(&key, self.params.lease_ttl, now).await
            else {
                debug!(lease = %key, "Threshold scan already running, skipping");
                continue;
            };

            let result = self.scan_account(&account, now).await;
            self.leases.release(&key, token).await;

            match result {
                Ok(count) => sent += count,
                Err(e) => {
                    error!(account = %account.id, error = %e, "Threshold scan failed for account");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            warn!(sent, failed, "Threshold scan finished with errors");
        }
        Ok(sent)
    }

    async fn scan_account(&self, account: &Account, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let tier = self.ledger.tier(&account.tier)?;
        if tier.is_pay_per_use() || account.period_elapsed(now) {
            return Ok(0);
        }

        let summary = self.ledger.usage_summary(&account.id, now).await?;
        let mut sent = 0;

        if summary.usage_percent >= self.params.threshold_percent
            && self
                .ledger
                .raise_flag(&account.id, UsageFlag::ThresholdAlerted, now)
                .await?
        {
            info!(account = %account.id, usage_percent = summary.usage_percent, "Usage threshold reached");
            self.notify(account, TEMPLATE_USAGE_THRESHOLD, summary.clone()).await;
            sent += 1;
        }

        if summary.usage_percent > 100.0
            && self
                .ledger
                .raise_flag(&account.id, UsageFlag::OverageFlagged, now)
                .await?
        {
            info!(account = %account.id, overage_tokens = summary.overage_tokens, "Account in overage");
            self.notify(account, TEMPLATE_USAGE_OVERAGE, summary).await;
            sent += 1;
        }
        Ok(sent)
    }

    async fn notify(&self, account: &Account, template_id: &'static str, stats: UsageSummary) {
        let notification = Notification {
            recipient: account.recipient.clone(),
            template_id,
            stats,
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(account = %account.id, template = template_id, error = %e, "Notification failed");
        }
    }

    /// Drive all three triggers until `shutdown` is cancelled.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup = tokio::time::interval(self.params.cleanup_interval);
            let mut reset = tokio::time::interval(self.params.period_reset_interval);
            let mut scan = tokio::time::interval(self.params.threshold_scan_interval);
            for ticker in [&mut cleanup, &mut reset, &mut scan] {
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }

            info!("Maintenance scheduler started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = cleanup.tick() => {
                        if let Err(e) = self.run_cleanup(Utc::now()).await {
                            error!(error = %e, "Cleanup failed");
                        }
                    }
                    _ = reset.tick() => {
                        if let Err(e) = self.run_period_reset(Utc::now()).await {
                            error!(error = %e, "Period reset failed");
                        }
                    }
                    _ = scan.tick() => {
                        if let Err(e) = self.run_threshold_scan(Utc::now()).await {
                            error!(error = %e, "Threshold scan failed");
                        }
                    }
                }
            }
            info!("Maintenance scheduler stopped");
        })
    }
}

fn chrono_duration(duration: std::time::Duration) -> chrono::Duration {
    // out-of-range values fall back to a century
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
