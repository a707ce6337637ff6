//! Repository ports
//!
//! Persistence is an external document store; these traits are the only
//! contact surface. Every write that can race is expressed as an atomic
//! operation the store must provide (closure update for jobs,
//! version-checked compare-and-swap for usage records).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consensus_domain::{Account, AccountId, DomainError, Job, JobId, UsageRecord};
use thiserror::Error;

/// Errors raised by repository adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Version conflict on {key}: expected {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Mutation applied atomically to a stored job
pub type JobMutation = Box<dyn FnOnce(&mut Job) -> Result<(), DomainError> + Send>;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: Job) -> Result<(), RepositoryError>;

    async fn get(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// Apply `mutate` atomically and return the updated job.
    ///
    /// If the mutation fails the stored job is left untouched.
    async fn update(&self, id: JobId, mutate: JobMutation) -> Result<Job, RepositoryError>;

    /// Ids of non-terminal jobs last updated before `cutoff`
    async fn stale_jobs(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, RepositoryError>;

    /// Delete terminal jobs finished before `cutoff`; returns how many went
    async fn purge_finished(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError>;

    /// Store `account` unless one with the same id exists; returns the stored one
    async fn insert_if_absent(&self, account: Account) -> Result<Account, RepositoryError>;

    async fn save(&self, account: Account) -> Result<(), RepositoryError>;

    async fn list(&self) -> Result<Vec<Account>, RepositoryError>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn get(
        &self,
        account: &AccountId,
        period_key: &str,
    ) -> Result<Option<UsageRecord>, RepositoryError>;

    /// Write `record` if the stored version equals `expected_version`
    /// (0 means "no record yet"). The stored record gets `expected_version + 1`.
    async fn compare_and_swap(
        &self,
        record: UsageRecord,
        expected_version: u64,
    ) -> Result<UsageRecord, RepositoryError>;
}
