//! Application layer for the consensus backend
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{PipelineParams, RegistryParams, SchedulerParams};
pub use ports::{
    audit_log::{AuditEvent, AuditLog, NoAuditLog},
    lease::{LeaseKey, LeaseManager, LeaseToken},
    notifier::{Notification, Notifier, NotifyError},
    progress::{NoProgress, ProgressNotifier},
    provider::{Completion, ProviderAdapter, ProviderError},
    repository::{AccountRepository, JobMutation, JobRepository, RepositoryError, UsageRepository},
    tier_catalog::TierCatalog,
};
pub use use_cases::job_registry::{
    Caller, EstimateReport, GenerateRequest, JobRegistry, RegistryError,
};
pub use use_cases::provider_roster::{ProviderRoster, RosterError};
pub use use_cases::run_consensus::{ConsensusPipeline, PipelineError, PipelineOutcome};
pub use use_cases::scheduler::{CleanupReport, MaintenanceScheduler, SchedulerError};
pub use use_cases::usage_ledger::{LedgerError, UsageFlag, UsageLedger};
