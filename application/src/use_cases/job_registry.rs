//! Job registry
//!
//! Entry point for callers: validates and admits requests, creates jobs,
//! starts their pipelines under a global concurrency cap, and answers
//! status, result, cancellation and estimate queries. Callers only ever see
//! their own jobs.

use crate::config::RegistryParams;
use crate::ports::audit_log::{AuditEvent, AuditLog, NoAuditLog};
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::repository::{JobRepository, RepositoryError};
use crate::use_cases::run_consensus::{ConsensusPipeline, PipelineOutcome};
use crate::use_cases::usage_ledger::{LedgerError, UsageLedger};
use chrono::Utc;
use consensus_domain::{
    AccountId, AvailabilityCheck, ConsensusArtifact, ConsensusInput, Depth, DomainError,
    FailureCode, FailureReason, GenerationOptions, Job, JobId, JobStatus, UsageSummary,
    estimate_for_input,
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("Insufficient tokens: {required} required, {available} available")]
    AdmissionDenied {
        required: u64,
        available: u64,
        overage: u64,
    },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job is {0:?}, not completed")]
    NotCompleted(JobStatus),

    #[error("Job already finished")]
    AlreadyFinished,

    #[error("Generation failed ({})", .0.code.as_str())]
    GenerationFailed(FailureReason),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Authenticated caller as supplied by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub account_id: AccountId,
    pub tier: String,
}

impl Caller {
    pub fn new(account_id: AccountId, tier: impl Into<String>) -> Self {
        Self {
            account_id,
            tier: tier.into(),
        }
    }
}

/// Raw request fields, validated by the registry
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub topic: String,
    pub sources: Vec<String>,
    pub options: GenerationOptions,
}

/// Pre-submission cost estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateReport {
    pub estimated_tokens: u64,
    pub check: AvailabilityCheck,
}

pub struct JobRegistry {
    jobs: Arc<dyn JobRepository>,
    ledger: Arc<UsageLedger>,
    pipeline: Arc<ConsensusPipeline>,
    progress: Arc<dyn ProgressNotifier>,
    audit: Arc<dyn AuditLog>,
    permits: Arc<Semaphore>,
    running: Arc<DashMap<JobId, CancellationToken>>,
}

impl JobRegistry {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        ledger: Arc<UsageLedger>,
        pipeline: Arc<ConsensusPipeline>,
        params: RegistryParams,
    ) -> Self {
        Self {
            jobs,
            ledger,
            pipeline,
            progress: Arc::new(NoProgress),
            audit: Arc::new(NoAuditLog),
            permits: Arc::new(Semaphore::new(params.max_concurrent_jobs.max(1))),
            running: Arc::new(DashMap::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    /// Jobs whose pipelines have been started and not yet returned
    pub fn running_jobs(&self) -> usize {
        self.running.len()
    }

    /// Validate, admit and start a new job.
    pub async fn submit(
        &self,
        caller: &Caller,
        request: GenerateRequest,
    ) -> Result<JobId, RegistryError> {
        let now = Utc::now();
        let input = ConsensusInput::new(request.topic, request.sources)?;
        let report = self.admission(caller, &input, request.options.depth).await?;
        if !report.check.admitted {
            info!(
                account = %caller.account_id,
                required = report.check.required,
                available = report.check.available,
                "Admission denied"
            );
            return Err(RegistryError::AdmissionDenied {
                required: report.check.required,
                available: report.check.available,
                overage: report.check.overage,
            });
        }

        let job = Job::new(
            caller.account_id.clone(),
            input,
            request.options,
            report.estimated_tokens,
            now,
        );
        let job_id = job.id();
        let options = *job.options();
        self.jobs.insert(job).await?;

        info!(
            job_id = %job_id,
            account = %caller.account_id,
            estimate = report.estimated_tokens,
            overage = report.check.overage,
            "Job submitted"
        );
        self.audit.log(AuditEvent::new(
            "job_submitted",
            json!({
                "job_id": job_id.to_string(),
                "account_id": caller.account_id.as_str(),
                "tier": caller.tier,
                "depth": options.depth.as_str(),
                "estimated_tokens": report.estimated_tokens,
                "overage": report.check.overage,
            }),
        ));

        self.spawn_pipeline(job_id);
        Ok(job_id)
    }

    /// Estimate a request's cost and whether it would be admitted now.
    pub async fn estimate(
        &self,
        caller: &Caller,
        request: GenerateRequest,
    ) -> Result<EstimateReport, RegistryError> {
        let input = ConsensusInput::new(request.topic, request.sources)?;
        self.admission(caller, &input, request.options.depth).await
    }

    /// The caller's job, for status polling
    pub async fn get_job(&self, caller: &Caller, job_id: JobId) -> Result<Job, RegistryError> {
        match self.jobs.get(job_id).await? {
            Some(job) if job.account_id() == &caller.account_id => Ok(job),
            _ => Err(RegistryError::NotFound(job_id.to_string())),
        }
    }

    /// Final artifact of a completed job.
    pub async fn get_result(
        &self,
        caller: &Caller,
        job_id: JobId,
    ) -> Result<ConsensusArtifact, RegistryError> {
        let job = self.get_job(caller, job_id).await?;
        match (job.artifact(), job.failure()) {
            (Some(artifact), _) => Ok(artifact.clone()),
            (None, Some(failure)) => Err(RegistryError::GenerationFailed(failure.clone())),
            (None, None) => Err(RegistryError::NotCompleted(job.status())),
        }
    }

    /// Fail the job now and stop its pipeline.
    ///
    /// Tokens recorded so far are charged immediately; calls still in
    /// flight are charged by the pipeline once they settle.
    pub async fn cancel(&self, caller: &Caller, job_id: JobId) -> Result<Job, RegistryError> {
        self.get_job(caller, job_id).await?;

        let now = Utc::now();
        let reason = FailureReason::new(FailureCode::Cancelled, None, "cancelled by caller");
        let job = match self
            .jobs
            .update(job_id, Box::new(move |job| job.fail(reason, now).map(|_| ())))
            .await
        {
            Ok(job) => job,
            Err(RepositoryError::Domain(_)) => return Err(RegistryError::AlreadyFinished),
            Err(e) => return Err(e.into()),
        };

        if let Some(token) = self.running.get(&job_id) {
            token.cancel();
        }

        let tokens = job.actual_tokens().unwrap_or_default();
        self.ledger.consume(job.account_id(), tokens, now).await?;

        info!(job_id = %job_id, tokens, "Job cancelled");
        self.audit.log(AuditEvent::new(
            "job_failed",
            json!({
                "job_id": job_id.to_string(),
                "account_id": job.account_id().as_str(),
                "code": FailureCode::Cancelled.as_str(),
                "tokens": tokens,
            }),
        ));
        Ok(job)
    }

    /// Usage of the caller's current billing period
    pub async fn usage(&self, caller: &Caller) -> Result<UsageSummary, RegistryError> {
        let now = Utc::now();
        self.ledger
            .ensure_account(&caller.account_id, &caller.tier, now)
            .await?;
        Ok(self.ledger.usage_summary(&caller.account_id, now).await?)
    }

    async fn admission(
        &self,
        caller: &Caller,
        input: &ConsensusInput,
        depth: Depth,
    ) -> Result<EstimateReport, RegistryError> {
        let now = Utc::now();
        self.ledger
            .ensure_account(&caller.account_id, &caller.tier, now)
            .await?;
        let estimate = estimate_for_input(input, depth, self.pipeline.roster().len());
        let check = self
            .ledger
            .check_availability(&caller.account_id, estimate.total, now)
            .await?;
        Ok(EstimateReport {
            estimated_tokens: estimate.total,
            check,
        })
    }

    fn spawn_pipeline(&self, job_id: JobId) {
        let token = CancellationToken::new();
        self.running.insert(job_id, token.clone());

        let pipeline = self.pipeline.clone();
        let progress = self.progress.clone();
        let permits = self.permits.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Job semaphore closed");
                    running.remove(&job_id);
                    return;
                }
            };

            match pipeline.run(job_id, token, progress.as_ref()).await {
                Ok(PipelineOutcome::Stopped) => {
                    info!(job_id = %job_id, "Pipeline stopped, job finished elsewhere")
                }
                Ok(_) => {}
                Err(e) => warn!(job_id = %job_id, error = %e, "Pipeline aborted"),
            }
            running.remove(&job_id);
        });
    }
}
