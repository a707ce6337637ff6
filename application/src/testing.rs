//! In-memory doubles for the ports, shared by the use case tests.

use crate::ports::audit_log::{AuditEvent, AuditLog};
use crate::ports::lease::{LeaseKey, LeaseManager, LeaseToken};
use crate::ports::notifier::{Notification, Notifier, NotifyError};
use crate::ports::provider::{Completion, ProviderAdapter, ProviderError};
use crate::ports::repository::{
    AccountRepository, JobMutation, JobRepository, RepositoryError, UsageRepository,
};
use crate::ports::tier_catalog::TierCatalog;
use crate::use_cases::provider_roster::ProviderRoster;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consensus_domain::{
    Account, AccountId, Job, JobId, Prompt, ProviderId, SubscriptionTier, UsageRecord,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==================== Providers ====================

/// What a scripted provider does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Reply(&'static str, u64),
    Fail(ProviderError),
    /// Sleep, then reply
    Slow(Duration, &'static str, u64),
}

/// Provider that plays back a script; the last step repeats forever.
pub struct ScriptedProvider {
    id: ProviderId,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedProvider {
    pub fn new(id: &str, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id).unwrap(),
            script: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(id: &str, text: &'static str, tokens: u64) -> Arc<Self> {
        Self::new(id, vec![Step::Reply(text, tokens)])
    }

    pub fn failing(id: &str, error: ProviderError) -> Arc<Self> {
        Self::new(id, vec![Step::Fail(error)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match script.pop_front() {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last
                .clone()
                .unwrap_or(Step::Fail(ProviderError::invalid_response("empty script"))),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.next_step() {
            Step::Reply(text, tokens) => Ok(Completion::new(text, tokens)),
            Step::Fail(e) => Err(e),
            Step::Slow(delay, text, tokens) => {
                tokio::time::sleep(delay).await;
                Ok(Completion::new(text, tokens))
            }
        }
    }
}

pub fn roster_of(providers: &[Arc<ScriptedProvider>]) -> ProviderRoster {
    let adapters = providers
        .iter()
        .map(|p| p.clone() as Arc<dyn ProviderAdapter>)
        .collect();
    ProviderRoster::new(adapters, Duration::from_secs(45)).unwrap()
}

// ==================== Repositories ====================

#[derive(Default)]
pub struct MemoryJobs {
    jobs: Mutex<HashMap<JobId, Job>>,
}

#[async_trait]
impl JobRepository for MemoryJobs {
    async fn insert(&self, job: Job) -> Result<(), RepositoryError> {
        self.jobs.lock().unwrap().insert(job.id(), job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, id: JobId, mutate: JobMutation) -> Result<Job, RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
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
            .lock()
            .unwrap()
            .values()
            .filter(|j| !j.is_terminal() && j.updated_at() < cutoff)
            .map(|j| j.id())
            .collect())
    }

    async fn purge_finished(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, j| !matches!(j.finished_at(), Some(t) if t < cutoff));
        Ok(before - jobs.len())
    }
}

#[derive(Default)]
pub struct MemoryAccounts {
    accounts: Mutex<BTreeMap<AccountId, Account>>,
}

#[async_trait]
impl AccountRepository for MemoryAccounts {
    async fn get(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.lock().unwrap().get(id).cloned())
    }

    async fn insert_if_absent(&self, account: Account) -> Result<Account, RepositoryError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .entry(account.id.clone())
            .or_insert(account)
            .clone())
    }

    async fn save(&self, account: Account) -> Result<(), RepositoryError> {
        self.accounts.lock().unwrap().insert(account.id.clone(), account);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Account>, RepositoryError> {
        Ok(self.accounts.lock().unwrap().values().cloned().collect())
    }
}

/// Usage store with optional injected version conflicts
#[derive(Default)]
pub struct MemoryUsage {
    records: Mutex<HashMap<(AccountId, String), UsageRecord>>,
    conflicts_left: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryUsage {
    pub fn with_conflicts(conflicts: usize) -> Self {
        let usage = Self::default();
        usage.conflicts_left.store(conflicts, Ordering::SeqCst);
        usage
    }
}

#[async_trait]
impl UsageRepository for MemoryUsage {
    async fn get(
        &self,
        account: &AccountId,
        period_key: &str,
    ) -> Result<Option<UsageRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(account.clone(), period_key.to_string()))
            .cloned())
    }

    async fn compare_and_swap(
        &self,
        mut record: UsageRecord,
        expected_version: u64,
    ) -> Result<UsageRecord, RepositoryError> {
        let key = (record.account_id.clone(), record.period_key.clone());
        if self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RepositoryError::Conflict {
                key: key.1,
                expected: expected_version,
                found: expected_version + 1,
            });
        }
        let mut records = self.records.lock().unwrap();
        let found = records.get(&key).map(|r| r.version).unwrap_or(0);
        if found != expected_version {
            return Err(RepositoryError::Conflict {
                key: key.1,
                expected: expected_version,
                found,
            });
        }
        record.version = expected_version + 1;
        records.insert(key, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}

pub struct StaticTiers(pub Vec<SubscriptionTier>);

impl Default for StaticTiers {
    fn default() -> Self {
        Self(vec![
            SubscriptionTier::metered("starter", 50_000, 2),
            SubscriptionTier::metered("pro", 500_000, 1),
            SubscriptionTier::pay_per_use("payg", 4),
        ])
    }
}

impl TierCatalog for StaticTiers {
    fn tier(&self, name: &str) -> Option<SubscriptionTier> {
        self.0.iter().find(|t| t.name == name).cloned()
    }

    fn tiers(&self) -> Vec<SubscriptionTier> {
        self.0.clone()
    }
}

// ==================== Side channels ====================

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn templates(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|n| n.template_id).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLeases {
    held: Mutex<HashMap<LeaseKey, (LeaseToken, DateTime<Utc>)>>,
    next: AtomicU64,
}

impl MemoryLeases {
    /// Take a lease from outside the code under test
    pub fn hold(&self, key: LeaseKey, until: DateTime<Utc>) {
        let token = LeaseToken(self.next.fetch_add(1, Ordering::SeqCst));
        self.held.lock().unwrap().insert(key, (token, until));
    }
}

#[async_trait]
impl LeaseManager for MemoryLeases {
    async fn try_acquire(
        &self,
        key: &LeaseKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<LeaseToken> {
        let mut held = self.held.lock().unwrap();
        if let Some((_, expires)) = held.get(key) {
            if *expires > now {
                return None;
            }
        }
        let token = LeaseToken(self.next.fetch_add(1, Ordering::SeqCst));
        let expires = now + chrono::Duration::from_std(ttl).unwrap();
        held.insert(key.clone(), (token, expires));
        Some(token)
    }

    async fn release(&self, key: &LeaseKey, token: LeaseToken) {
        let mut held = self.held.lock().unwrap();
        if matches!(held.get(key), Some((t, _)) if *t == token) {
            held.remove(key);
        }
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    pub events: Mutex<Vec<(&'static str, Value)>>,
}

impl RecordingAudit {
    pub fn types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

impl AuditLog for RecordingAudit {
    fn log(&self, event: AuditEvent) {
        self.events.lock().unwrap().push((event.event_type, event.payload));
    }
}
