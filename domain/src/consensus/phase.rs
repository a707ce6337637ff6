//! Pipeline phases and the job state machine

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Phase of a consensus job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Every provider drafts an answer independently
    Drafting,
    /// Each surviving draft is reviewed by another provider
    Review,
    /// The arbiter produces the final text
    Arbitration,
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Drafting => "drafting",
            Phase::Review => "review",
            Phase::Arbitration => "arbitration",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Phase::Drafting => "Independent Drafting",
            Phase::Review => "Peer Review",
            Phase::Arbitration => "Final Arbitration",
        }
    }

    /// 1-based phase number
    pub fn number(&self) -> u8 {
        match self {
            Phase::Drafting => 1,
            Phase::Review => 2,
            Phase::Arbitration => 3,
        }
    }

    /// Progress band `[start, end)` this phase occupies, in percent
    pub fn progress_band(&self) -> (u8, u8) {
        match self {
            Phase::Drafting => (5, 40),
            Phase::Review => (40, 75),
            Phase::Arbitration => (75, 95),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Coarse job status exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Fine-grained job state
///
/// ```text
/// Pending -> Phase1Running -> Phase2Running -> Phase3Running -> Completed
///    |             |                |                |
///    +-------------+----------------+----------------+------> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Phase1Running,
    Phase2Running,
    Phase3Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn running(phase: Phase) -> Self {
        match phase {
            Phase::Drafting => JobState::Phase1Running,
            Phase::Review => JobState::Phase2Running,
            Phase::Arbitration => JobState::Phase3Running,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Phase1Running | JobState::Phase2Running | JobState::Phase3Running => {
                JobStatus::Running
            }
            JobState::Completed => JobStatus::Completed,
            JobState::Failed => JobStatus::Failed,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            JobState::Phase1Running => Some(Phase::Drafting),
            JobState::Phase2Running => Some(Phase::Review),
            JobState::Phase3Running => Some(Phase::Arbitration),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether `self -> next` is a legal edge of the state machine
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (*self, next),
            (Pending, Phase1Running)
                | (Phase1Running, Phase2Running)
                | (Phase2Running, Phase3Running)
                | (Phase3Running, Completed)
                | (Pending | Phase1Running | Phase2Running | Phase3Running, Failed)
        )
    }

    pub fn transition(self, next: JobState) -> Result<JobState, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Phase1Running => "phase1_running",
            JobState::Phase2Running => "phase2_running",
            JobState::Phase3Running => "phase3_running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
