//! Configuration loading for consensus-server
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment variables: `CONSENSUS_<SECTION>__<KEY>`
//! 2. `--config <path>` specified file
//! 3. Project root: `./consensus.toml` or `./.consensus.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/consensus-server/config.toml`
//! 5. Default values

mod error;
mod file_config;
mod loader;
mod tier_catalog;
mod validation;

pub use error::ConfigError;
pub use file_config::{
    FileConfig, FileLoggingConfig, FilePipelineConfig, FileProviderConfig, FileSchedulerConfig,
    FileServerConfig, FileTierConfig, ProviderKind, default_tiers,
};
pub use loader::ConfigLoader;
pub use tier_catalog::ConfigTierCatalog;
pub use validation::{ConfigIssue, ConfigIssueCode, Severity};
