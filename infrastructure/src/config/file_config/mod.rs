//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted to application parameters
//! with the issues found along the way.

mod logging;
mod pipeline;
mod providers;
mod scheduler;
mod server;
mod tiers;

pub use logging::FileLoggingConfig;
pub use pipeline::FilePipelineConfig;
pub use providers::{FileProviderConfig, ProviderKind};
pub use scheduler::FileSchedulerConfig;
pub use server::FileServerConfig;
pub use tiers::{FileTierConfig, default_tiers};

use super::error::ConfigError;
use super::validation::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Peer review needs a reviewer other than the draft's author
const MIN_ENABLED_PROVIDERS: usize = 2;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// HTTP listener and job concurrency
    pub server: FileServerConfig,
    /// Quorum, timeouts and arbitration
    pub pipeline: FilePipelineConfig,
    /// Language-model providers, in roster order
    pub providers: Vec<FileProviderConfig>,
    /// Subscription tiers keyed by name
    pub tiers: BTreeMap<String, FileTierConfig>,
    /// Maintenance triggers
    pub scheduler: FileSchedulerConfig,
    /// Diagnostic and audit logging
    pub logging: FileLoggingConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            server: FileServerConfig::default(),
            pipeline: FilePipelineConfig::default(),
            providers: Vec::new(),
            tiers: default_tiers(),
            scheduler: FileSchedulerConfig::default(),
            logging: FileLoggingConfig::default(),
        }
    }
}

impl FileConfig {
    /// Providers that take part in the pipeline
    pub fn enabled_providers(&self) -> impl Iterator<Item = &FileProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Validate the entire configuration, returning all detected issues.
    ///
    /// It checks:
    /// 1. Section values (bind address, timeouts, intervals)
    /// 2. Provider entries, id uniqueness and the arbiter reference
    /// 3. The tier catalog
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        // 1. Sections
        issues.extend(self.server.parse_bind().1);
        issues.extend(self.server.to_registry_params().1);
        issues.extend(self.pipeline.to_params().1);
        issues.extend(self.scheduler.to_params().1);

        // 2. Providers
        let mut seen = HashSet::new();
        for (index, provider) in self.providers.iter().enumerate() {
            issues.extend(provider.validate(index));
            if !seen.insert(provider.id.as_str()) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::Duplicate {
                        field: "providers.id".to_string(),
                        value: provider.id.clone(),
                    },
                    format!("providers: id '{}' is used more than once", provider.id),
                ));
            }
        }

        let enabled = self.enabled_providers().count();
        if enabled < MIN_ENABLED_PROVIDERS {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::TooFewProviders { enabled },
                format!(
                    "providers: {enabled} enabled [[providers]] entr{}, at least {MIN_ENABLED_PROVIDERS} are required so drafts are reviewed by another provider",
                    if enabled == 1 { "y" } else { "ies" }
                ),
            ));
        } else if enabled < self.pipeline.min_quorum {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: "pipeline.min_quorum".to_string(),
                    value: self.pipeline.min_quorum.to_string(),
                },
                format!(
                    "pipeline.min_quorum: {} exceeds the {} enabled provider(s), quorum is capped",
                    self.pipeline.min_quorum, enabled
                ),
            ));
        }

        if let Some(arbiter) = &self.pipeline.arbiter
            && !self.enabled_providers().any(|p| &p.id == arbiter)
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::UnknownReference {
                    field: "pipeline.arbiter".to_string(),
                    value: arbiter.clone(),
                },
                format!("pipeline.arbiter: '{arbiter}' is not an enabled provider"),
            ));
        }

        // 3. Tiers
        issues.extend(tiers::validate_tiers(&self.tiers));

        issues
    }

    /// Validate and fail on errors; returns the remaining warnings.
    pub fn ensure_valid(&self) -> Result<Vec<ConfigIssue>, ConfigError> {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            self.validate().into_iter().partition(|i| i.is_error());
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigError::Invalid(
                errors.into_iter().map(|i| i.message).collect(),
            ))
        }
    }
}
