//! Job entity
//!
//! A [`Job`] is one consensus request moving through the pipeline. All state
//! changes go through methods that enforce the [`JobState`] machine, keep
//! progress monotonic and record `actual_tokens` exactly once.

use super::phase::{JobState, JobStatus, Phase};
use super::value_objects::{ConsensusArtifact, FailureReason, PhaseResult};
use crate::billing::AccountId;
use crate::core::error::DomainError;
use crate::core::input::{ConsensusInput, GenerationOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(JobId)
            .map_err(|_| DomainError::validation("job_id", "must be a UUID"))
    }
}

/// A consensus job (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    account_id: AccountId,
    input: ConsensusInput,
    options: GenerationOptions,
    state: JobState,
    progress: u8,
    estimated_tokens: u64,
    actual_tokens: Option<u64>,
    phase_results: Vec<PhaseResult>,
    artifact: Option<ConsensusArtifact>,
    failure: Option<FailureReason>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        account_id: AccountId,
        input: ConsensusInput,
        options: GenerationOptions,
        estimated_tokens: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            account_id,
            input,
            options,
            state: JobState::Pending,
            progress: 0,
            estimated_tokens,
            actual_tokens: None,
            phase_results: Vec::new(),
            artifact: None,
            failure: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn input(&self) -> &ConsensusInput {
        &self.input
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.state.phase()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    pub fn actual_tokens(&self) -> Option<u64> {
        self.actual_tokens
    }

    pub fn phase_results(&self) -> &[PhaseResult] {
        &self.phase_results
    }

    pub fn artifact(&self) -> Option<&ConsensusArtifact> {
        self.artifact.as_ref()
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Tokens spent across every recorded phase so far
    pub fn spent_tokens(&self) -> u64 {
        self.phase_results.iter().map(|r| r.tokens_used()).sum()
    }

    /// Enter the running state of `phase`.
    pub fn begin_phase(&mut self, phase: Phase, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.state = self.state.transition(JobState::running(phase))?;
        self.bump_progress(phase.progress_band().0);
        self.updated_at = now;
        Ok(())
    }

    /// Append the outputs of the phase currently running.
    pub fn record_phase(&mut self, result: PhaseResult, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.state.phase() != Some(result.phase) {
            return Err(DomainError::InvalidTransition {
                from: self.state.to_string(),
                to: format!("record {}", result.phase.as_str()),
            });
        }
        self.phase_results.push(result);
        self.updated_at = now;
        Ok(())
    }

    /// Raise progress; lower values are ignored.
    pub fn bump_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// Finish successfully with the arbitration artifact.
    ///
    /// `actual_tokens` becomes the sum over all phase results and the
    /// artifact's total is aligned with it.
    pub fn complete(
        &mut self,
        mut artifact: ConsensusArtifact,
        now: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let next = self.state.transition(JobState::Completed)?;
        let actual = self.record_actual_tokens()?;
        artifact.total_tokens = actual;
        self.state = next;
        self.artifact = Some(artifact);
        self.progress = 100;
        self.updated_at = now;
        self.finished_at = Some(now);
        Ok(actual)
    }

    /// Finish unsuccessfully. Returns the tokens spent before the failure.
    pub fn fail(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let next = self.state.transition(JobState::Failed)?;
        let actual = self.record_actual_tokens()?;
        self.state = next;
        self.failure = Some(reason);
        self.updated_at = now;
        self.finished_at = Some(now);
        Ok(actual)
    }

    fn record_actual_tokens(&mut self) -> Result<u64, DomainError> {
        if self.actual_tokens.is_some() {
            return Err(DomainError::TokensAlreadyRecorded(self.id.to_string()));
        }
        let spent = self.spent_tokens();
        self.actual_tokens = Some(spent);
        Ok(spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::value_objects::{FailureCode, ProviderOutput};
    use crate::core::provider::ProviderId;

    fn job() -> Job {
        Job::new(
            AccountId::new("acct").unwrap(),
            ConsensusInput::new("Is Rust fast?", vec![]).unwrap(),
            GenerationOptions::default(),
            9_000,
            Utc::now(),
        )
    }

    fn phase_result(phase: Phase, tokens: &[u64]) -> PhaseResult {
        let now = Utc::now();
        PhaseResult {
            phase,
            outputs: tokens
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    ProviderOutput::success(ProviderId::new(format!("p{}", i)).unwrap(), "x", *t, 1)
                })
                .collect(),
            started_at: now,
            finished_at: now,
        }
    }

    fn artifact(job: &Job) -> ConsensusArtifact {
        ConsensusArtifact {
            job_id: job.id().to_string(),
            text: "final".to_string(),
            confidence: 0.8,
            contributing_providers: vec![],
            arbiter: ProviderId::new("p0").unwrap(),
            total_tokens: 0,
            phase_tokens: vec![],
            traces: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_complete_sums_phase_tokens() {
        let mut job = job();
        let now = Utc::now();
        job.begin_phase(Phase::Drafting, now).unwrap();
        job.record_phase(phase_result(Phase::Drafting, &[100, 200]), now).unwrap();
        job.begin_phase(Phase::Review, now).unwrap();
        job.record_phase(phase_result(Phase::Review, &[50, 60]), now).unwrap();
        job.begin_phase(Phase::Arbitration, now).unwrap();
        job.record_phase(phase_result(Phase::Arbitration, &[300]), now).unwrap();

        let art = artifact(&job);
        let actual = job.complete(art, now).unwrap();
        assert_eq!(actual, 710);
        assert_eq!(job.actual_tokens(), Some(710));
        assert_eq!(job.artifact().unwrap().total_tokens, 710);
        assert_eq!(job.progress(), 100);
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn test_cannot_complete_before_arbitration() {
        let mut job = job();
        job.begin_phase(Phase::Drafting, Utc::now()).unwrap();
        let art = artifact(&job);
        assert!(job.complete(art, Utc::now()).is_err());
        assert_eq!(job.actual_tokens(), None);
    }

    #[test]
    fn test_fail_records_spent_tokens_once() {
        let mut job = job();
        let now = Utc::now();
        job.begin_phase(Phase::Drafting, now).unwrap();
        job.record_phase(phase_result(Phase::Drafting, &[40, 2]), now).unwrap();
        let reason = FailureReason::new(FailureCode::QuorumNotMet, Some(Phase::Drafting), "1 of 2");
        assert_eq!(job.fail(reason.clone(), now).unwrap(), 42);
        assert!(job.fail(reason, now).is_err());
        assert_eq!(job.actual_tokens(), Some(42));
    }

    #[test]
    fn test_record_phase_must_match_running_phase() {
        let mut job = job();
        job.begin_phase(Phase::Drafting, Utc::now()).unwrap();
        assert!(job.record_phase(phase_result(Phase::Review, &[1]), Utc::now()).is_err());
    }

    #[test]
    fn test_progress_never_regresses() {
        let mut job = job();
        job.bump_progress(30);
        job.bump_progress(10);
        assert_eq!(job.progress(), 30);
        job.bump_progress(250);
        assert_eq!(job.progress(), 100);
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }
}
