//! Provider configuration from TOML (`[[providers]]` entries)

use crate::config::error::ConfigError;
use crate::config::validation::{ConfigIssue, ConfigIssueCode};
use crate::providers::ProviderSettings;
use consensus_domain::ProviderId;
use serde::{Deserialize, Serialize};

/// Wire protocol spoken by a provider entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    /// OpenAI chat completions (also OpenAI-compatible gateways via `base_url`)
    OpenAi,
}

impl ProviderKind {
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com",
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// Label used in diagnostics and as arbiter reference (e.g. "claude")
    pub id: String,
    pub kind: ProviderKind,
    /// Model name sent with every request
    pub model: String,
    /// Base URL (default depends on `kind`)
    pub base_url: Option<String>,
    /// Direct API key (not recommended, use `api_key_env` instead)
    pub api_key: Option<String>,
    /// Environment variable holding the API key (default depends on `kind`)
    pub api_key_env: Option<String>,
    /// Max tokens per response
    pub max_tokens: u32,
    /// Anthropic API version header
    pub api_version: String,
    /// Disabled entries are kept in the file but not called
    pub enabled: bool,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: ProviderKind::default(),
            model: String::new(),
            base_url: None,
            api_key: None,
            api_key_env: None,
            max_tokens: 4096,
            api_version: "2023-06-01".to_string(),
            enabled: true,
        }
    }
}

impl FileProviderConfig {
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_key_env())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }

    /// Check one entry; `index` is its position in the list.
    pub fn validate(&self, index: usize) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if let Err(e) = ProviderId::new(self.id.as_str()) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidValue {
                    field: format!("providers[{index}].id"),
                    value: self.id.clone(),
                },
                format!("providers[{index}].id: {e}"),
            ));
        }
        if self.model.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyValue {
                    field: format!("providers[{index}].model"),
                },
                format!("providers[{index}].model: model name cannot be empty"),
            ));
        }
        if self.max_tokens == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidValue {
                    field: format!("providers[{index}].max_tokens"),
                    value: "0".to_string(),
                },
                format!("providers[{index}].max_tokens: must be positive"),
            ));
        }
        issues
    }

    /// Resolve the credential and produce the settings an adapter is built from.
    ///
    /// `lookup_env` is the process environment in production; adapters never
    /// read the environment themselves.
    pub fn resolve<F>(&self, lookup_env: F) -> Result<ProviderSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let id = ProviderId::new(self.id.as_str()).map_err(|e| ConfigError::ProviderSetup {
            provider: self.id.clone(),
            reason: e.to_string(),
        })?;

        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| lookup_env(self.api_key_env()).filter(|k| !k.is_empty()))
            .ok_or_else(|| ConfigError::MissingCredential {
                provider: self.id.clone(),
                env: self.api_key_env().to_string(),
            })?;

        Ok(ProviderSettings {
            id,
            kind: self.kind,
            model: self.model.clone(),
            base_url: self.base_url().to_string(),
            api_key,
            max_tokens: self.max_tokens,
            api_version: self.api_version.clone(),
        })
    }
}
