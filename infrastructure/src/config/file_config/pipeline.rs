//! Consensus pipeline configuration from TOML (`[pipeline]` section)

use crate::config::validation::{ConfigIssue, ConfigIssueCode};
use consensus_application::PipelineParams;
use consensus_application::config::{MAX_CALL_TIMEOUT, MIN_CALL_TIMEOUT};
use consensus_domain::ProviderId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw `[pipeline]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    /// Successful drafts required to continue past phase 1
    pub min_quorum: usize,
    /// Per provider call timeout, clamped to 30..=60 seconds
    pub call_timeout_secs: u64,
    /// Provider id that runs arbitration (defaults to the first provider)
    pub arbiter: Option<String>,
    /// Arbitration calls before the job fails
    pub arbitration_attempts: usize,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        let params = PipelineParams::default();
        Self {
            min_quorum: params.min_quorum,
            call_timeout_secs: params.call_timeout.as_secs(),
            arbiter: None,
            arbitration_attempts: params.arbitration_attempts,
        }
    }
}

impl FilePipelineConfig {
    /// Convert to [`PipelineParams`], reporting adjusted or invalid values.
    pub fn to_params(&self) -> (PipelineParams, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let requested = Duration::from_secs(self.call_timeout_secs);
        let mut params = PipelineParams::default()
            .with_min_quorum(self.min_quorum)
            .with_call_timeout(requested)
            .with_arbitration_attempts(self.arbitration_attempts);

        if params.call_timeout != requested {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: "pipeline.call_timeout_secs".to_string(),
                    value: self.call_timeout_secs.to_string(),
                },
                format!(
                    "pipeline.call_timeout_secs: must be between {} and {}, using {}",
                    MIN_CALL_TIMEOUT.as_secs(),
                    MAX_CALL_TIMEOUT.as_secs(),
                    params.call_timeout.as_secs()
                ),
            ));
        }

        if self.min_quorum == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: "pipeline.min_quorum".to_string(),
                    value: "0".to_string(),
                },
                "pipeline.min_quorum: 0 is treated as 1",
            ));
        }

        if self.arbitration_attempts == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidValue {
                    field: "pipeline.arbitration_attempts".to_string(),
                    value: "0".to_string(),
                },
                "pipeline.arbitration_attempts: at least one attempt is required",
            ));
        }

        if let Some(arbiter) = &self.arbiter {
            match ProviderId::new(arbiter.as_str()) {
                Ok(id) => params = params.with_arbiter(id),
                Err(e) => issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidValue {
                        field: "pipeline.arbiter".to_string(),
                        value: arbiter.clone(),
                    },
                    format!("pipeline.arbiter: {e}"),
                )),
            }
        }

        (params, issues)
    }
}
