//! Run Consensus use case
//!
//! Drives one job through the three-phase pipeline:
//!
//! 1. **Drafting** - every roster provider answers the same prompt
//! 2. **Review** - each surviving draft is reviewed by a different provider
//! 3. **Arbitration** - the arbiter merges drafts and reviews into the final text
//!
//! Phases run strictly in sequence; calls within a phase run concurrently
//! and the phase waits for all of them to settle. Every state change goes
//! through the job repository so pollers always see a consistent job.
//!
//! Whoever moves a job into a terminal state charges the ledger for the
//! tokens recorded on it. Tokens from a phase that could not be recorded
//! because the job was cancelled meanwhile are charged here as trailing
//! usage, and so are calls that were still in flight at cancellation.

use crate::config::PipelineParams;
use crate::ports::audit_log::{AuditEvent, AuditLog, NoAuditLog};
use crate::ports::progress::{ProgressNotifier, progress_within};
use crate::ports::provider::ProviderAdapter;
use crate::ports::repository::{JobRepository, RepositoryError};
use crate::use_cases::provider_roster::{ProviderRoster, invoke_with_timeout};
use crate::use_cases::usage_ledger::{LedgerError, UsageLedger};
use chrono::Utc;
use consensus_domain::{
    AccountId, ConsensusArtifact, DraftReview, FailureCode, FailureReason, Job, JobId, Phase,
    PhaseResult, PhaseTokens, Prompt, PromptTemplate, ProviderFailureKind, ProviderId,
    ProviderOutput, assign_reviewers, confidence,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that can occur while running a job
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("No providers configured")]
    EmptyRoster,

    #[error("Arbiter {0} is not in the provider roster")]
    UnknownArbiter(ProviderId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed { tokens: u64, confidence: f64 },
    Failed { code: FailureCode, tokens: u64 },
    /// Someone else finished the job first (cancellation, stale cleanup)
    Stopped,
}

/// Provider outputs of one batch of concurrent calls
struct Batch {
    outputs: Vec<ProviderOutput>,
    cancelled: bool,
}

/// Use case for running a consensus job
pub struct ConsensusPipeline {
    roster: ProviderRoster,
    jobs: Arc<dyn JobRepository>,
    ledger: Arc<UsageLedger>,
    params: PipelineParams,
    arbiter: ProviderId,
    audit: Arc<dyn AuditLog>,
}

impl ConsensusPipeline {
    pub fn new(
        roster: ProviderRoster,
        jobs: Arc<dyn JobRepository>,
        ledger: Arc<UsageLedger>,
        params: PipelineParams,
    ) -> Result<Self, PipelineError> {
        let arbiter = match &params.arbiter {
            Some(arbiter) if roster.get(arbiter).is_none() => {
                return Err(PipelineError::UnknownArbiter(arbiter.clone()));
            }
            Some(arbiter) => arbiter.clone(),
            None => roster
                .ids()
                .into_iter()
                .next()
                .ok_or(PipelineError::EmptyRoster)?,
        };
        Ok(Self {
            roster,
            jobs,
            ledger,
            params,
            arbiter,
            audit: Arc::new(NoAuditLog),
        })
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn roster(&self) -> &ProviderRoster {
        &self.roster
    }

    pub fn arbiter(&self) -> &ProviderId {
        &self.arbiter
    }

    /// Run `job_id` to a terminal state.
    pub async fn run(
        &self,
        job_id: JobId,
        cancel: CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<PipelineOutcome, PipelineError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))?;
        if job.is_terminal() {
            return Ok(PipelineOutcome::Stopped);
        }

        info!(
            job_id = %job_id,
            providers = self.roster.len(),
            arbiter = %self.arbiter,
            "Starting consensus job"
        );

        // ==================== Phase 1: Drafting ====================

        let Some(drafts) = self.drafting_phase(&job, &cancel, progress).await? else {
            return Ok(PipelineOutcome::Stopped);
        };

        let quorum = self.params.effective_quorum(self.roster.len());
        let survivors: Vec<&ProviderOutput> = drafts.successes().collect();
        if survivors.len() < quorum {
            let detail = format!(
                "{} of {} drafts succeeded, {} required; {}",
                survivors.len(),
                drafts.outputs.len(),
                quorum,
                describe_failures(&drafts.outputs)
            );
            warn!(job_id = %job_id, %detail, "Quorum not met");
            return self
                .fail(&job, FailureCode::QuorumNotMet, Phase::Drafting, detail)
                .await;
        }

        let draft_texts: Vec<(ProviderId, String)> = survivors
            .iter()
            .map(|o| (o.provider.clone(), o.text.clone()))
            .collect();

        // ==================== Phase 2: Review ====================

        let Some(reviews) = self
            .review_phase(&job, &draft_texts, &cancel, progress)
            .await?
        else {
            return Ok(PipelineOutcome::Stopped);
        };

        if reviews.is_empty() {
            let detail = format!("none of {} drafts received a review", draft_texts.len());
            warn!(job_id = %job_id, %detail, "Review phase failed");
            return self
                .fail(&job, FailureCode::NoReviews, Phase::Review, detail)
                .await;
        }
        let missing_reviews = draft_texts.len().saturating_sub(reviews.len());

        // ==================== Phase 3: Arbitration ====================

        let Some(arbitration) = self
            .arbitration_phase(&job, &draft_texts, &reviews, &cancel, progress)
            .await?
        else {
            return Ok(PipelineOutcome::Stopped);
        };

        let Some(final_output) = arbitration.successes().last().cloned() else {
            let detail = format!(
                "arbiter {} failed {} attempts; {}",
                self.arbiter,
                arbitration.outputs.len(),
                describe_failures(&arbitration.outputs)
            );
            warn!(job_id = %job_id, %detail, "Arbitration failed");
            return self
                .fail(&job, FailureCode::ArbitrationFailed, Phase::Arbitration, detail)
                .await;
        };

        let score = confidence(draft_texts.len(), missing_reviews);
        let contributors: Vec<ProviderId> = draft_texts.iter().map(|(p, _)| p.clone()).collect();
        self.complete(&job, final_output, contributors, score).await
    }

    async fn drafting_phase(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Option<PhaseResult>, PipelineError> {
        let phase = Phase::Drafting;
        let prompt = PromptTemplate::drafting_prompt(job.input(), job.options().depth);
        let calls = self
            .roster
            .adapters()
            .iter()
            .map(|adapter| (adapter.clone(), prompt.clone()))
            .collect();
        self.run_phase(job, phase, calls, cancel, progress).await
    }

    async fn review_phase(
        &self,
        job: &Job,
        drafts: &[(ProviderId, String)],
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Option<Vec<DraftReview>>, PipelineError> {
        let survivors: Vec<ProviderId> = drafts.iter().map(|(p, _)| p.clone()).collect();
        let assignments = assign_reviewers(&survivors, &self.roster.ids());

        let mut calls = Vec::with_capacity(assignments.len());
        let mut authors = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            let (Some(adapter), Some((_, draft))) = (
                self.roster.get(&assignment.reviewer),
                drafts.iter().find(|(p, _)| *p == assignment.author),
            ) else {
                continue;
            };
            calls.push((adapter, PromptTemplate::review_prompt(job.input().topic(), draft)));
            authors.push(assignment.author.clone());
        }
        debug!(job_id = %job.id(), assignments = calls.len(), "Review assignments planned");

        let Some(result) = self.run_phase(job, Phase::Review, calls, cancel, progress).await? else {
            return Ok(None);
        };

        let reviews = result
            .outputs
            .iter()
            .zip(authors)
            .filter(|(output, _)| output.is_success())
            .map(|(output, author)| DraftReview {
                reviewer: output.provider.clone(),
                author,
                content: output.text.clone(),
            })
            .collect();
        Ok(Some(reviews))
    }

    async fn arbitration_phase(
        &self,
        job: &Job,
        drafts: &[(ProviderId, String)],
        reviews: &[DraftReview],
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Option<PhaseResult>, PipelineError> {
        let phase = Phase::Arbitration;
        if !self.begin_phase(job.id(), phase).await? {
            return Ok(None);
        }

        let attempts = self.params.arbitration_attempts.max(1);
        let prompt = PromptTemplate::arbitration_prompt(job.input().topic(), drafts, reviews);
        let Some(adapter) = self.roster.get(&self.arbiter) else {
            return Err(PipelineError::UnknownArbiter(self.arbiter.clone()));
        };

        info!(job_id = %job.id(), phase = phase.as_str(), tasks = attempts, "Phase started");
        progress.on_phase_start(job.id(), phase, attempts);
        let started_at = Utc::now();
        let mut outputs = Vec::new();

        for attempt in 1..=attempts {
            let batch = self
                .run_calls(job, phase, vec![(adapter.clone(), prompt.clone())], cancel, progress)
                .await;
            let succeeded = batch.outputs.iter().any(ProviderOutput::is_success);
            outputs.extend(batch.outputs);

            if batch.cancelled {
                self.record_phase(job, phase_result(phase, outputs, started_at))
                    .await?;
                return Ok(None);
            }
            if succeeded {
                break;
            }
            if attempt < attempts {
                warn!(job_id = %job.id(), arbiter = %self.arbiter, attempt, "Arbitration failed, retrying");
            }
        }

        let result = phase_result(phase, outputs, started_at);
        if !self.record_phase(job, result.clone()).await? {
            return Ok(None);
        }
        progress.on_phase_complete(job.id(), phase);
        Ok(Some(result))
    }

    /// Enter `phase`, fan out `calls`, wait for all of them and record the result.
    ///
    /// Returns `None` when the job was finished by someone else meanwhile.
    async fn run_phase(
        &self,
        job: &Job,
        phase: Phase,
        calls: Vec<(Arc<dyn ProviderAdapter>, Prompt)>,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Option<PhaseResult>, PipelineError> {
        if !self.begin_phase(job.id(), phase).await? {
            return Ok(None);
        }

        info!(job_id = %job.id(), phase = phase.as_str(), tasks = calls.len(), "Phase started");
        progress.on_phase_start(job.id(), phase, calls.len());
        let started_at = Utc::now();

        let batch = self.run_calls(job, phase, calls, cancel, progress).await;
        let result = phase_result(phase, batch.outputs, started_at);
        if !self.record_phase(job, result.clone()).await? || batch.cancelled {
            return Ok(None);
        }

        info!(
            job_id = %job.id(),
            phase = phase.as_str(),
            succeeded = result.success_count(),
            tokens = result.tokens_used(),
            "Phase completed"
        );
        progress.on_phase_complete(job.id(), phase);
        Ok(Some(result))
    }

    /// Run provider calls concurrently and collect their outputs in call order.
    ///
    /// On cancellation the calls still in flight are handed to a detached
    /// task that waits for them and charges whatever they spent.
    async fn run_calls(
        &self,
        job: &Job,
        phase: Phase,
        calls: Vec<(Arc<dyn ProviderAdapter>, Prompt)>,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Batch {
        let total = calls.len();
        let timeout = self.roster.call_timeout();
        let providers: Vec<ProviderId> = calls.iter().map(|(a, _)| a.id().clone()).collect();

        let mut join_set = JoinSet::new();
        for (index, (adapter, prompt)) in calls.into_iter().enumerate() {
            join_set.spawn(async move { (index, invoke_with_timeout(adapter, prompt, timeout).await) });
        }

        let mut slots: Vec<Option<ProviderOutput>> = vec![None; total];
        let mut done = 0;
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                joined = join_set.join_next() => match joined {
                    None => break,
                    Some(Ok((index, output))) => {
                        done += 1;
                        progress.on_task_complete(job.id(), phase, &output.provider, output.is_success());
                        slots[index] = Some(output);
                        self.bump_progress(job.id(), progress_within(phase, done, total)).await;
                    }
                    Some(Err(e)) => {
                        done += 1;
                        warn!(job_id = %job.id(), phase = phase.as_str(), error = %e, "Provider task failed to join");
                    }
                },
            }
        }

        if cancelled {
            info!(job_id = %job.id(), in_flight = join_set.len(), "Job cancelled, draining in-flight calls");
            self.drain_detached(join_set, job.account_id().clone());
            return Batch {
                outputs: slots.into_iter().flatten().collect(),
                cancelled,
            };
        }

        let outputs = slots
            .into_iter()
            .zip(providers)
            .map(|(slot, provider)| {
                slot.unwrap_or_else(|| {
                    ProviderOutput::failure(
                        provider,
                        ProviderFailureKind::TransportError,
                        "provider task aborted",
                        0,
                        0,
                    )
                })
            })
            .collect();
        Batch { outputs, cancelled }
    }

    fn drain_detached(&self, mut join_set: JoinSet<(usize, ProviderOutput)>, account: AccountId) {
        if join_set.is_empty() {
            return;
        }
        let ledger = self.ledger.clone();
        tokio::spawn(async move {
            let mut tokens = 0;
            while let Some(joined) = join_set.join_next().await {
                if let Ok((_, output)) = joined {
                    tokens += output.tokens_used;
                }
            }
            if tokens > 0 {
                if let Err(e) = ledger.consume_trailing(&account, tokens, Utc::now()).await {
                    error!(account = %account, tokens, error = %e, "Failed to charge drained calls");
                }
            }
        });
    }

    /// Returns `false` when the job is already terminal.
    async fn begin_phase(&self, job_id: JobId, phase: Phase) -> Result<bool, PipelineError> {
        let now = Utc::now();
        match self
            .jobs
            .update(job_id, Box::new(move |job| job.begin_phase(phase, now)))
            .await
        {
            Ok(_) => Ok(true),
            Err(RepositoryError::Domain(e)) => {
                debug!(job_id = %job_id, phase = phase.as_str(), error = %e, "Job finished elsewhere");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append a phase result. If the job was finished meanwhile, the
    /// phase's tokens are charged as trailing usage and `false` is returned.
    async fn record_phase(&self, job: &Job, result: PhaseResult) -> Result<bool, PipelineError> {
        let now = Utc::now();
        let tokens = result.tokens_used();
        let phase = result.phase;
        let successes = result.success_count();

        match self
            .jobs
            .update(job.id(), Box::new(move |j| j.record_phase(result, now)))
            .await
        {
            Ok(_) => {
                self.audit.log(AuditEvent::new(
                    "phase_completed",
                    json!({
                        "job_id": job.id().to_string(),
                        "phase": phase.as_str(),
                        "succeeded": successes,
                        "tokens": tokens,
                    }),
                ));
                Ok(true)
            }
            Err(RepositoryError::Domain(_)) => {
                if tokens > 0 {
                    self.ledger
                        .consume_trailing(job.account_id(), tokens, now)
                        .await?;
                }
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn bump_progress(&self, job_id: JobId, value: u8) {
        let result = self
            .jobs
            .update(
                job_id,
                Box::new(move |job| {
                    if !job.is_terminal() {
                        job.bump_progress(value);
                    }
                    Ok(())
                }),
            )
            .await;
        if let Err(e) = result {
            warn!(job_id = %job_id, error = %e, "Failed to persist progress");
        }
    }

    async fn fail(
        &self,
        job: &Job,
        code: FailureCode,
        phase: Phase,
        detail: String,
    ) -> Result<PipelineOutcome, PipelineError> {
        let now = Utc::now();
        let reason = FailureReason::new(code, Some(phase), detail);
        let updated = match self
            .jobs
            .update(job.id(), Box::new(move |j| j.fail(reason, now).map(|_| ())))
            .await
        {
            Ok(updated) => updated,
            Err(RepositoryError::Domain(_)) => return Ok(PipelineOutcome::Stopped),
            Err(e) => return Err(e.into()),
        };

        let tokens = updated.actual_tokens().unwrap_or_default();
        self.ledger.consume(job.account_id(), tokens, now).await?;

        info!(job_id = %job.id(), code = code.as_str(), tokens, "Job failed");
        self.audit.log(AuditEvent::new(
            "job_failed",
            json!({
                "job_id": job.id().to_string(),
                "account_id": job.account_id().as_str(),
                "code": code.as_str(),
                "phase": phase.as_str(),
                "tokens": tokens,
            }),
        ));
        Ok(PipelineOutcome::Failed { code, tokens })
    }

    async fn complete(
        &self,
        job: &Job,
        final_output: ProviderOutput,
        contributors: Vec<ProviderId>,
        score: f64,
    ) -> Result<PipelineOutcome, PipelineError> {
        let now = Utc::now();
        let arbiter = self.arbiter.clone();
        let include_traces = job.options().include_metadata;

        let updated = match self
            .jobs
            .update(
                job.id(),
                Box::new(move |j| {
                    let artifact = ConsensusArtifact {
                        job_id: j.id().to_string(),
                        text: final_output.text,
                        confidence: score,
                        contributing_providers: contributors,
                        arbiter,
                        total_tokens: 0,
                        phase_tokens: j
                            .phase_results()
                            .iter()
                            .map(|r| PhaseTokens {
                                phase: r.phase,
                                tokens: r.tokens_used(),
                            })
                            .collect(),
                        traces: if include_traces {
                            j.phase_results().to_vec()
                        } else {
                            Vec::new()
                        },
                        created_at: now,
                    };
                    j.complete(artifact, now).map(|_| ())
                }),
            )
            .await
        {
            Ok(updated) => updated,
            Err(RepositoryError::Domain(_)) => return Ok(PipelineOutcome::Stopped),
            Err(e) => return Err(e.into()),
        };

        let tokens = updated.actual_tokens().unwrap_or_default();
        self.ledger.consume(job.account_id(), tokens, now).await?;

        info!(job_id = %job.id(), tokens, confidence = score, "Job completed");
        self.audit.log(AuditEvent::new(
            "job_completed",
            json!({
                "job_id": job.id().to_string(),
                "account_id": job.account_id().as_str(),
                "tokens": tokens,
                "estimated_tokens": job.estimated_tokens(),
                "confidence": score,
            }),
        ));
        Ok(PipelineOutcome::Completed {
            tokens,
            confidence: score,
        })
    }
}

fn phase_result(
    phase: Phase,
    outputs: Vec<ProviderOutput>,
    started_at: chrono::DateTime<Utc>,
) -> PhaseResult {
    PhaseResult {
        phase,
        outputs,
        started_at,
        finished_at: Utc::now(),
    }
}

/// `provider: kind` for every failed output, for diagnostics
fn describe_failures(outputs: &[ProviderOutput]) -> String {
    let failures: Vec<String> = outputs
        .iter()
        .filter_map(|o| o.error.map(|kind| format!("{}: {}", o.provider, kind.as_str())))
        .collect();
    if failures.is_empty() {
        "no provider errors".to_string()
    } else {
        failures.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::progress::NoProgress;
    use crate::ports::provider::ProviderError;
    use crate::testing::*;
    use consensus_domain::{ConsensusInput, GenerationOptions, JobStatus};
    use std::sync::Mutex;

    struct Harness {
        jobs: Arc<MemoryJobs>,
        ledger: Arc<UsageLedger>,
        audit: Arc<RecordingAudit>,
        pipeline: ConsensusPipeline,
    }

    fn account() -> AccountId {
        AccountId::new("acct-1").unwrap()
    }

    async fn harness(providers: &[Arc<ScriptedProvider>], params: PipelineParams) -> Harness {
        let jobs = Arc::new(MemoryJobs::default());
        let ledger = Arc::new(UsageLedger::new(
            Arc::new(MemoryAccounts::default()),
            Arc::new(MemoryUsage::default()),
            Arc::new(StaticTiers::default()),
        ));
        ledger.ensure_account(&account(), "pro", Utc::now()).await.unwrap();
        let audit = Arc::new(RecordingAudit::default());
        let pipeline = ConsensusPipeline::new(roster_of(providers), jobs.clone(), ledger.clone(), params)
            .unwrap()
            .with_audit_log(audit.clone());
        Harness {
            jobs,
            ledger,
            audit,
            pipeline,
        }
    }

    async fn submit(h: &Harness, include_metadata: bool) -> JobId {
        let job = Job::new(
            account(),
            ConsensusInput::new("Is Rust memory safe?", vec!["The Rust book".into()]).unwrap(),
            GenerationOptions {
                include_metadata,
                ..Default::default()
            },
            10_000,
            Utc::now(),
        );
        let id = job.id();
        h.jobs.insert(job).await.unwrap();
        id
    }

    async fn consumed(h: &Harness) -> u64 {
        h.ledger
            .usage_summary(&account(), Utc::now())
            .await
            .unwrap()
            .tokens_consumed
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressNotifier for RecordingProgress {
        fn on_phase_start(&self, _job_id: JobId, phase: Phase, total_tasks: usize) {
            self.events.lock().unwrap().push(format!("start {} {}", phase.as_str(), total_tasks));
        }
        fn on_task_complete(&self, _job_id: JobId, _phase: Phase, _provider: &ProviderId, _success: bool) {}
        fn on_phase_complete(&self, _job_id: JobId, phase: Phase) {
            self.events.lock().unwrap().push(format!("done {}", phase.as_str()));
        }
    }

    #[tokio::test]
    async fn test_three_of_four_drafts_completes() {
        let providers = vec![
            ScriptedProvider::replying("claude", "answer", 100),
            ScriptedProvider::replying("gpt", "answer", 100),
            ScriptedProvider::replying("gemini", "answer", 100),
            ScriptedProvider::failing("mistral", ProviderError::Timeout),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();

        // 3 drafts + 3 reviews + 1 arbitration, 100 tokens each
        match outcome {
            PipelineOutcome::Completed { tokens, confidence } => {
                assert_eq!(tokens, 700);
                assert!((confidence - 0.95).abs() < 1e-9);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let job = h.jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.actual_tokens(), Some(700));
        assert_eq!(job.progress(), 100);

        let artifact = job.artifact().unwrap();
        assert_eq!(artifact.text, "answer");
        let contributors: Vec<&str> = artifact
            .contributing_providers
            .iter()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(contributors, vec!["claude", "gpt", "gemini"]);
        assert_eq!(artifact.arbiter.as_str(), "claude");
        assert!(artifact.traces.is_empty());
        let phase_sum: u64 = artifact.phase_tokens.iter().map(|p| p.tokens).sum();
        assert_eq!(phase_sum, artifact.total_tokens);

        assert_eq!(consumed(&h).await, 700);
        assert_eq!(providers[3].calls(), 1);
    }

    #[tokio::test]
    async fn test_unusable_draft_is_still_charged() {
        let providers = vec![
            ScriptedProvider::replying("claude", "answer", 100),
            ScriptedProvider::replying("gpt", "answer", 100),
            ScriptedProvider::failing(
                "gemini",
                ProviderError::InvalidResponse {
                    message: "response has no text content".into(),
                    tokens_used: 40,
                },
            ),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();

        // 2 drafts + the billed blank draft, 2 reviews, 1 arbitration
        match outcome {
            PipelineOutcome::Completed { tokens, confidence } => {
                assert_eq!(tokens, 540);
                assert!((confidence - 0.8).abs() < 1e-9);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let job = h.jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.actual_tokens(), Some(540));
        assert!(
            !job.artifact()
                .unwrap()
                .contributing_providers
                .iter()
                .any(|p| p.as_str() == "gemini")
        );
        assert_eq!(consumed(&h).await, 540);
    }

    #[tokio::test]
    async fn test_quorum_failure_charges_drafting_tokens() {
        let providers = vec![
            ScriptedProvider::replying("claude", "answer", 150),
            ScriptedProvider::failing("gpt", ProviderError::RateLimited("429".into())),
            ScriptedProvider::failing("gemini", ProviderError::Timeout),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();
        assert_eq!(
            outcome,
            PipelineOutcome::Failed {
                code: FailureCode::QuorumNotMet,
                tokens: 150
            }
        );

        let job = h.jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.artifact().is_none());
        let failure = job.failure().unwrap();
        assert!(failure.detail.contains("gpt: rate_limited"));
        assert!(failure.detail.contains("gemini: timeout"));
        assert_eq!(consumed(&h).await, 150);
        assert!(h.audit.types().contains(&"job_failed"));
    }

    #[tokio::test]
    async fn test_double_arbiter_failure_charges_earlier_phases() {
        let arbiter = ScriptedProvider::new(
            "claude",
            vec![
                Step::Reply("draft", 200),
                Step::Reply("review", 80),
                Step::Fail(ProviderError::TransportError("503".into())),
                Step::Fail(ProviderError::TransportError("503".into())),
            ],
        );
        let providers = vec![
            arbiter.clone(),
            ScriptedProvider::replying("gpt", "text", 100),
            ScriptedProvider::replying("gemini", "text", 100),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();

        // drafts 200+100+100, reviews 80+100+100
        assert_eq!(
            outcome,
            PipelineOutcome::Failed {
                code: FailureCode::ArbitrationFailed,
                tokens: 680
            }
        );
        assert_eq!(arbiter.calls(), 4);
        let job = h.jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.phase_results().len(), 3);
        assert_eq!(job.phase_results()[2].outputs.len(), 2);
        assert_eq!(consumed(&h).await, 680);
    }

    #[tokio::test]
    async fn test_arbitration_retry_succeeds() {
        let arbiter = ScriptedProvider::new(
            "claude",
            vec![
                Step::Reply("draft", 10),
                Step::Reply("review", 10),
                Step::Fail(ProviderError::Timeout),
                Step::Reply("final", 50),
            ],
        );
        let providers = vec![arbiter, ScriptedProvider::replying("gpt", "text", 10)];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, true).await;

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Completed { tokens: 90, .. }));

        let job = h.jobs.get(id).await.unwrap().unwrap();
        let artifact = job.artifact().unwrap();
        assert_eq!(artifact.text, "final");
        assert_eq!(artifact.traces.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_review_degrades_confidence() {
        let providers = vec![
            ScriptedProvider::replying("claude", "text", 10),
            ScriptedProvider::new(
                "gpt",
                vec![Step::Reply("draft", 10), Step::Fail(ProviderError::Timeout)],
            ),
            ScriptedProvider::replying("gemini", "text", 10),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();
        match outcome {
            PipelineOutcome::Completed { confidence, .. } => {
                assert!((confidence - 0.90).abs() < 1e-9)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_reviews_fails_job() {
        let providers = vec![
            ScriptedProvider::new(
                "claude",
                vec![Step::Reply("draft", 10), Step::Fail(ProviderError::Timeout)],
            ),
            ScriptedProvider::new(
                "gpt",
                vec![
                    Step::Reply("draft", 10),
                    Step::Fail(ProviderError::invalid_response("empty")),
                ],
            ),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();
        assert_eq!(
            outcome,
            PipelineOutcome::Failed {
                code: FailureCode::NoReviews,
                tokens: 20
            }
        );
    }

    #[tokio::test]
    async fn test_phases_are_reported_in_order() {
        let providers = vec![
            ScriptedProvider::replying("claude", "text", 10),
            ScriptedProvider::replying("gpt", "text", 10),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;
        let progress = RecordingProgress::default();

        h.pipeline.run(id, CancellationToken::new(), &progress).await.unwrap();
        assert_eq!(
            *progress.events.lock().unwrap(),
            vec![
                "start drafting 2",
                "done drafting",
                "start review 2",
                "done review",
                "start arbitration 2",
                "done arbitration"
            ]
        );
        assert_eq!(
            h.audit.types(),
            vec![
                "phase_completed",
                "phase_completed",
                "phase_completed",
                "job_completed"
            ]
        );
    }

    #[tokio::test]
    async fn test_drafting_prompt_is_identical_for_every_provider() {
        let providers = vec![
            ScriptedProvider::replying("claude", "text", 10),
            ScriptedProvider::replying("gpt", "text", 10),
        ];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;
        h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();

        assert_eq!(providers[0].prompts()[0], providers[1].prompts()[0]);
        assert_eq!(providers[0].prompts()[0].system, PromptTemplate::drafting_system());
    }

    #[tokio::test]
    async fn test_unknown_arbiter_is_rejected() {
        let providers = vec![ScriptedProvider::replying("claude", "text", 10)];
        let params = PipelineParams::default().with_arbiter(ProviderId::new("gpt").unwrap());
        let result = ConsensusPipeline::new(
            roster_of(&providers),
            Arc::new(MemoryJobs::default()),
            Arc::new(UsageLedger::new(
                Arc::new(MemoryAccounts::default()),
                Arc::new(MemoryUsage::default()),
                Arc::new(StaticTiers::default()),
            )),
            params,
        );
        assert!(matches!(result, Err(PipelineError::UnknownArbiter(_))));
    }

    #[tokio::test]
    async fn test_terminal_job_is_not_rerun() {
        let providers = vec![ScriptedProvider::replying("claude", "text", 10)];
        let h = harness(&providers, PipelineParams::default()).await;
        let id = submit(&h, false).await;
        h.jobs
            .update(
                id,
                Box::new(|j| {
                    j.fail(
                        FailureReason::new(FailureCode::Cancelled, None, "by caller"),
                        Utc::now(),
                    )
                    .map(|_| ())
                }),
            )
            .await
            .unwrap();

        let outcome = h.pipeline.run(id, CancellationToken::new(), &NoProgress).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Stopped);
        assert_eq!(providers[0].calls(), 0);
    }
}
