//! HTTP server configuration from TOML (`[server]` section)

use crate::config::validation::{ConfigIssue, ConfigIssueCode};
use consensus_application::RegistryParams;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Raw `[server]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    /// Address the API listens on
    pub bind: String,
    /// Pipelines allowed to run at once; further jobs queue
    pub max_concurrent_jobs: usize,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_concurrent_jobs: 16,
            cors_origins: Vec::new(),
        }
    }
}

impl FileServerConfig {
    /// Parse the bind address.
    pub fn parse_bind(&self) -> (Option<SocketAddr>, Vec<ConfigIssue>) {
        match self.bind.parse::<SocketAddr>() {
            Ok(addr) => (Some(addr), Vec::new()),
            Err(e) => (
                None,
                vec![ConfigIssue::error(
                    ConfigIssueCode::InvalidValue {
                        field: "server.bind".to_string(),
                        value: self.bind.clone(),
                    },
                    format!("server.bind: '{}' is not a socket address ({e})", self.bind),
                )],
            ),
        }
    }

    pub fn to_registry_params(&self) -> (RegistryParams, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut params = RegistryParams {
            max_concurrent_jobs: self.max_concurrent_jobs,
        };
        if self.max_concurrent_jobs == 0 {
            params = RegistryParams::default();
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: "server.max_concurrent_jobs".to_string(),
                    value: "0".to_string(),
                },
                format!(
                    "server.max_concurrent_jobs: 0 would block every job, using {}",
                    params.max_concurrent_jobs
                ),
            ));
        }
        (params, issues)
    }
}
