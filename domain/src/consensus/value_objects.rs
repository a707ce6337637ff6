//! Consensus value objects - immutable result types for each pipeline phase.
//!
//! - [`ProviderOutput`] - one provider call's outcome within a phase
//! - [`PhaseResult`] - ordered outputs of one phase
//! - [`DraftReview`] - a peer review of one draft by another provider
//! - [`ConsensusArtifact`] - the final synthesized result of a job
//! - [`FailureReason`] - why a job ended in `Failed`

use super::phase::Phase;
use crate::core::provider::ProviderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classified provider failure, as recorded in a phase trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFailureKind {
    RateLimited,
    Timeout,
    InvalidResponse,
    TransportError,
}

impl ProviderFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFailureKind::RateLimited => "rate_limited",
            ProviderFailureKind::Timeout => "timeout",
            ProviderFailureKind::InvalidResponse => "invalid_response",
            ProviderFailureKind::TransportError => "transport_error",
        }
    }

    /// Transient failures may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderFailureKind::InvalidResponse)
    }
}

/// Outcome of a single provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutput {
    pub provider: ProviderId,
    /// Response text; empty on failure
    pub text: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderFailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProviderOutput {
    pub fn success(
        provider: ProviderId,
        text: impl Into<String>,
        tokens_used: u64,
        latency_ms: u64,
    ) -> Self {
        Self {
            provider,
            text: text.into(),
            tokens_used,
            latency_ms,
            error: None,
            error_message: None,
        }
    }

    /// Failed call; `tokens_used` is what the provider billed regardless.
    pub fn failure(
        provider: ProviderId,
        kind: ProviderFailureKind,
        message: impl Into<String>,
        tokens_used: u64,
        latency_ms: u64,
    ) -> Self {
        Self {
            provider,
            text: String::new(),
            tokens_used,
            latency_ms,
            error: Some(kind),
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// All provider outputs of one phase, in roster order (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub outputs: Vec<ProviderOutput>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PhaseResult {
    pub fn tokens_used(&self) -> u64 {
        self.outputs.iter().map(|o| o.tokens_used).sum()
    }

    pub fn successes(&self) -> impl Iterator<Item = &ProviderOutput> {
        self.outputs.iter().filter(|o| o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }
}

/// Peer review of one draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftReview {
    pub reviewer: ProviderId,
    /// Provider that wrote the reviewed draft
    pub author: ProviderId,
    pub content: String,
}

/// Token totals for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTokens {
    pub phase: Phase,
    pub tokens: u64,
}

/// Final output of a completed job (immutable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusArtifact {
    pub job_id: String,
    pub text: String,
    pub confidence: f64,
    pub contributing_providers: Vec<ProviderId>,
    pub arbiter: ProviderId,
    pub total_tokens: u64,
    pub phase_tokens: Vec<PhaseTokens>,
    pub traces: Vec<PhaseResult>,
    pub created_at: DateTime<Utc>,
}

/// Internal diagnostic code attached to a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    QuorumNotMet,
    NoReviews,
    ArbitrationFailed,
    Cancelled,
    Stale,
    Internal,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::QuorumNotMet => "quorum_not_met",
            FailureCode::NoReviews => "no_reviews",
            FailureCode::ArbitrationFailed => "arbitration_failed",
            FailureCode::Cancelled => "cancelled",
            FailureCode::Stale => "stale",
            FailureCode::Internal => "internal",
        }
    }
}

/// Why a job failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub code: FailureCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub detail: String,
}

impl FailureReason {
    pub fn new(code: FailureCode, phase: Option<Phase>, detail: impl Into<String>) -> Self {
        Self {
            code,
            phase,
            detail: detail.into(),
        }
    }
}
