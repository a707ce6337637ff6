//! `DashMap`-backed repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consensus_application::{
    AccountRepository, JobMutation, JobRepository, RepositoryError, UsageRepository,
};
use consensus_domain::{Account, AccountId, Job, JobId, UsageRecord};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: DashMap<JobId, Job>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn insert(&self, job: Job) -> Result<(), RepositoryError> {
        match self.jobs.entry(job.id()) {
            Entry::Occupied(_) => Err(RepositoryError::Backend(format!(
                "job {} already exists",
                job.id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.get(&id).map(|job| job.clone()))
    }

    async fn update(&self, id: JobId, mutate: JobMutation) -> Result<Job, RepositoryError> {
        // The shard stays write-locked while the mutation runs
        let mut stored = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let mut next = stored.clone();
        mutate(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    async fn stale_jobs(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, RepositoryError> {
        Ok(self
            .jobs
            .iter()
            .filter(|job| !job.is_terminal() && job.updated_at() < cutoff)
            .map(|job| job.id())
            .collect())
    }

    async fn purge_finished(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !matches!(job.finished_at(), Some(at) if at < cutoff));
        Ok(before.saturating_sub(self.jobs.len()))
    }
}

#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: DashMap<AccountId, Account>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn get(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.get(id).map(|a| a.clone()))
    }

    async fn insert_if_absent(&self, account: Account) -> Result<Account, RepositoryError> {
        Ok(self
            .accounts
            .entry(account.id.clone())
            .or_insert(account)
            .clone())
    }

    async fn save(&self, account: Account) -> Result<(), RepositoryError> {
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|a| a.clone()).collect();
        accounts.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(accounts)
    }
}

/// Usage records keyed by (account, period) with optimistic versioning
#[derive(Default)]
pub struct MemoryUsageRepository {
    records: DashMap<(AccountId, String), UsageRecord>,
}

impl MemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageRepository for MemoryUsageRepository {
    async fn get(
        &self,
        account: &AccountId,
        period_key: &str,
    ) -> Result<Option<UsageRecord>, RepositoryError> {
        Ok(self
            .records
            .get(&(account.clone(), period_key.to_string()))
            .map(|r| r.clone()))
    }

    async fn compare_and_swap(
        &self,
        mut record: UsageRecord,
        expected_version: u64,
    ) -> Result<UsageRecord, RepositoryError> {
        let key = (record.account_id.clone(), record.period_key.clone());
        let conflict = |found: u64| RepositoryError::Conflict {
            key: format!("{}/{}", key.0, key.1),
            expected: expected_version,
            found,
        };
        match self.records.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let found = slot.get().version;
                if found != expected_version {
                    return Err(conflict(found));
                }
                record.version = expected_version + 1;
                slot.insert(record.clone());
            }
            Entry::Vacant(slot) => {
                if expected_version != 0 {
                    return Err(conflict(0));
                }
                record.version = 1;
                slot.insert(record.clone());
            }
        }
        Ok(record)
    }
}
