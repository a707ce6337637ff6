//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// `tracing` filter directive used when neither `-v` nor `RUST_LOG` is given
    pub filter: Option<String>,
    /// Emit diagnostic logs as JSON
    pub json: bool,
    /// Directory for daily-rolling diagnostic log files
    pub directory: Option<PathBuf>,
    /// JSONL audit log path; auditing is off when unset
    pub audit_log: Option<PathBuf>,
}
