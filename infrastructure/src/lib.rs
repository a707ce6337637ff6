//! Infrastructure layer for consensus-server
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: provider HTTP clients, in-process stores, the audit
//! log, the notifier and configuration file loading.

pub mod config;
pub mod logging;
pub mod notify;
pub mod persistence;
pub mod providers;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigIssue, ConfigLoader, ConfigTierCatalog, FileConfig, ProviderKind, Severity,
};
pub use logging::JsonlAuditLog;
pub use notify::TracingNotifier;
pub use persistence::{
    MemoryAccountRepository, MemoryJobRepository, MemoryLeaseManager, MemoryUsageRepository,
};
pub use providers::{
    AnthropicAdapter, OpenAiAdapter, ProviderSettings, build_adapter, build_adapters,
};
