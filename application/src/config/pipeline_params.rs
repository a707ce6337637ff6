//! Pipeline parameters: quorum, per-call timeout and arbitration policy.
//!
//! These are application-layer concerns, not domain policy.

use consensus_domain::ProviderId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Successful drafts required to continue past Phase 1
    pub min_quorum: usize,
    /// Upper bound on a single provider call
    pub call_timeout: Duration,
    /// Provider that writes the final text; first roster entry when unset
    pub arbiter: Option<ProviderId>,
    /// Arbitration attempts before the job fails (initial call included)
    pub arbitration_attempts: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            min_quorum: 2,
            call_timeout: Duration::from_secs(45),
            arbiter: None,
            arbitration_attempts: 2,
        }
    }
}

impl PipelineParams {
    pub fn with_min_quorum(mut self, quorum: usize) -> Self {
        self.min_quorum = quorum;
        self
    }

    /// Set the per-call timeout, clamped to 30-60 seconds.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout.clamp(MIN_CALL_TIMEOUT, MAX_CALL_TIMEOUT);
        self
    }

    pub fn with_arbiter(mut self, arbiter: ProviderId) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn with_arbitration_attempts(mut self, attempts: usize) -> Self {
        self.arbitration_attempts = attempts;
        self
    }

    /// Quorum actually applied to a roster of `providers`: at least 1, never above N.
    pub fn effective_quorum(&self, providers: usize) -> usize {
        self.min_quorum.max(1).min(providers.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = PipelineParams::default();
        assert_eq!(params.min_quorum, 2);
        assert_eq!(params.call_timeout, Duration::from_secs(45));
        assert_eq!(params.arbitration_attempts, 2);
        assert!(params.arbiter.is_none());
    }

    #[test]
    fn test_call_timeout_is_clamped() {
        let short = PipelineParams::default().with_call_timeout(Duration::from_secs(5));
        assert_eq!(short.call_timeout, MIN_CALL_TIMEOUT);
        let long = PipelineParams::default().with_call_timeout(Duration::from_secs(600));
        assert_eq!(long.call_timeout, MAX_CALL_TIMEOUT);
    }

    #[test]
    fn test_effective_quorum_never_exceeds_roster() {
        let params = PipelineParams::default().with_min_quorum(5);
        assert_eq!(params.effective_quorum(3), 3);
        assert_eq!(params.effective_quorum(0), 1);
        assert_eq!(PipelineParams::default().with_min_quorum(0).effective_quorum(4), 1);
    }
}
