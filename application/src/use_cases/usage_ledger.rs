//! Usage ledger
//!
//! Owns every write to an account's usage record. Increments for one account
//! are serialized by an in-process async mutex and persisted with a
//! version-checked compare-and-swap, so concurrent jobs never lose tokens.
//! Different accounts never contend.

use crate::ports::audit_log::{AuditEvent, AuditLog, NoAuditLog};
use crate::ports::repository::{AccountRepository, RepositoryError, UsageRepository};
use crate::ports::tier_catalog::TierCatalog;
use chrono::{DateTime, Utc};
use consensus_domain::{
    Account, AccountId, AvailabilityCheck, SubscriptionTier, UsageRecord, UsageSummary,
    check_availability,
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Compare-and-swap attempts before giving up on a write
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Unknown subscription tier: {0}")]
    UnknownTier(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Usage record for {0} stayed contended after {MAX_WRITE_ATTEMPTS} attempts")]
    Contended(AccountId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-period boolean markers kept on the usage record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageFlag {
    ThresholdAlerted,
    OverageFlagged,
}

pub struct UsageLedger {
    accounts: Arc<dyn AccountRepository>,
    usage: Arc<dyn UsageRepository>,
    tiers: Arc<dyn TierCatalog>,
    audit: Arc<dyn AuditLog>,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl UsageLedger {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        usage: Arc<dyn UsageRepository>,
        tiers: Arc<dyn TierCatalog>,
    ) -> Self {
        Self {
            accounts,
            usage,
            tiers,
            audit: Arc::new(NoAuditLog),
            locks: DashMap::new(),
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn tier(&self, name: &str) -> Result<SubscriptionTier, LedgerError> {
        self.tiers
            .tier(name)
            .ok_or_else(|| LedgerError::UnknownTier(name.to_string()))
    }

    /// Load the account, opening it on first sight.
    ///
    /// The caller's tier is authoritative and overwrites the stored one. An
    /// elapsed billing period is rolled over before the account is returned.
    pub async fn ensure_account(
        &self,
        id: &AccountId,
        tier: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        self.tier(tier)?;
        let mut account = self
            .accounts
            .insert_if_absent(Account::open(id.clone(), tier, now))
            .await?;

        if account.tier != tier {
            let lock = self.lock_for(id);
            let _guard = lock.lock().await;
            // re-read under the lock so a concurrent reset's period survives
            let mut current = self.account(id).await?;
            if current.tier != tier {
                info!(account = %id, from = %current.tier, to = %tier, "Account tier changed");
                current.tier = tier.to_string();
                self.accounts.save(current.clone()).await?;
            }
            account = current;
        }

        if account.period_elapsed(now) {
            self.reset_period(id, now).await?;
            account = self.account(id).await?;
        }
        Ok(account)
    }

    pub async fn account(&self, id: &AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))
    }

    /// Usage record of the account's current period, zeroed if none exists yet
    pub async fn current_record(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<UsageRecord, LedgerError> {
        Ok(self
            .usage
            .get(&account.id, &account.period_key())
            .await?
            .unwrap_or_else(|| UsageRecord::for_account(account, now)))
    }

    /// Decide whether a job of `estimate` tokens may start.
    pub async fn check_availability(
        &self,
        id: &AccountId,
        estimate: u64,
        now: DateTime<Utc>,
    ) -> Result<AvailabilityCheck, LedgerError> {
        let account = self.account(id).await?;
        let tier = self.tier(&account.tier)?;
        let record = self.current_record(&account, now).await?;
        Ok(check_availability(&tier, record.tokens_consumed, estimate))
    }

    /// Atomically charge one finished job's `tokens` to the current period.
    pub async fn consume(
        &self,
        id: &AccountId,
        tokens: u64,
        now: DateTime<Utc>,
    ) -> Result<UsageRecord, LedgerError> {
        self.charge(id, tokens, true, now).await
    }

    /// Charge tokens spent by calls that settled after their job was charged.
    pub async fn consume_trailing(
        &self,
        id: &AccountId,
        tokens: u64,
        now: DateTime<Utc>,
    ) -> Result<UsageRecord, LedgerError> {
        self.charge(id, tokens, false, now).await
    }

    async fn charge(
        &self,
        id: &AccountId,
        tokens: u64,
        counts_job: bool,
        now: DateTime<Utc>,
    ) -> Result<UsageRecord, LedgerError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let record = self
            .write_record(id, now, |record, tier| {
                if counts_job {
                    record.apply_consumption(tokens, tier, now);
                } else {
                    record.add_tokens(tokens, tier, now);
                }
                true
            })
            .await?;

        debug!(
            account = %id,
            tokens,
            consumed = record.tokens_consumed,
            trailing = !counts_job,
            "Usage consumed"
        );
        self.audit.log(AuditEvent::new(
            "usage_consumed",
            json!({
                "account_id": id.as_str(),
                "period": record.period_key,
                "tokens": tokens,
                "tokens_consumed": record.tokens_consumed,
                "overage_tokens": record.overage_tokens,
            }),
        ));
        Ok(record)
    }

    /// Set a per-period flag. Returns `true` only for the call that set it.
    pub async fn raise_flag(
        &self,
        id: &AccountId,
        flag: UsageFlag,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut raised = false;
        self.write_record(id, now, |record, _| {
            let slot = match flag {
                UsageFlag::ThresholdAlerted => &mut record.threshold_alerted,
                UsageFlag::OverageFlagged => &mut record.overage_flagged,
            };
            raised = !*slot;
            *slot = true;
            raised
        })
        .await?;
        Ok(raised)
    }

    /// Advance an elapsed billing period and start a fresh usage record.
    ///
    /// Returns `None` when the period is still current, so concurrent or
    /// repeated calls reset at most once.
    pub async fn reset_period(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageSummary>, LedgerError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut account = self.account(id).await?;
        let previous = account.period_key();
        let advanced = account.roll_period(now);
        if advanced == 0 {
            return Ok(None);
        }
        let tier = self.tier(&account.tier)?;
        self.accounts.save(account.clone()).await?;

        let fresh = UsageRecord::for_account(&account, now);
        let record = match self.usage.compare_and_swap(fresh.clone(), 0).await {
            Ok(record) => record,
            // a record for the new period already exists; keep it
            Err(RepositoryError::Conflict { .. }) => {
                self.current_record(&account, now).await?
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            account = %id,
            from = %previous,
            to = %account.period_key(),
            periods = advanced,
            "Billing period reset"
        );
        self.audit.log(AuditEvent::new(
            "usage_reset",
            json!({
                "account_id": id.as_str(),
                "previous_period": previous,
                "period": account.period_key(),
                "periods_advanced": advanced,
            }),
        ));
        Ok(Some(UsageSummary::build(&account, &tier, &record)))
    }

    pub async fn usage_summary(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<UsageSummary, LedgerError> {
        let account = self.account(id).await?;
        let tier = self.tier(&account.tier)?;
        let record = self.current_record(&account, now).await?;
        Ok(UsageSummary::build(&account, &tier, &record))
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.accounts.list().await?)
    }

    fn lock_for(&self, id: &AccountId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }

    /// Read-modify-write the current record with bounded CAS retries.
    ///
    /// `apply` returns whether it changed anything; unchanged records are
    /// not written. Callers must hold the account lock.
    async fn write_record<F>(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
        mut apply: F,
    ) -> Result<UsageRecord, LedgerError>
    where
        F: FnMut(&mut UsageRecord, &SubscriptionTier) -> bool,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let account = self.account(id).await?;
            let tier = self.tier(&account.tier)?;
            let mut record = self.current_record(&account, now).await?;
            let expected = record.version;

            if !apply(&mut record, &tier) {
                return Ok(record);
            }

            match self.usage.compare_and_swap(record, expected).await {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::Conflict { .. }) => {
                    warn!(account = %id, attempt, "Usage record version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Contended(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chrono::TimeZone;

    fn ledger_with(usage: Arc<MemoryUsage>) -> UsageLedger {
        UsageLedger::new(
            Arc::new(MemoryAccounts::default()),
            usage,
            Arc::new(StaticTiers::default()),
        )
    }

    fn ledger() -> UsageLedger {
        ledger_with(Arc::new(MemoryUsage::default()))
    }

    fn acct(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_account_rejects_unknown_tier() {
        let ledger = ledger();
        let err = ledger
            .ensure_account(&acct("a"), "platinum", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTier(_)));
    }

    #[tokio::test]
    async fn test_ensure_account_follows_caller_tier() {
        let ledger = ledger();
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "starter", now).await.unwrap();
        let account = ledger.ensure_account(&acct("a"), "pro", now).await.unwrap();
        assert_eq!(account.tier, "pro");
        assert_eq!(ledger.account(&acct("a")).await.unwrap().tier, "pro");
    }

    #[tokio::test]
    async fn test_admission_with_no_usage() {
        let ledger = ledger();
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "starter", now).await.unwrap();

        let check = ledger.check_availability(&acct("a"), 8_000, now).await.unwrap();
        assert!(check.sufficient);
        assert!(check.admitted);
        assert_eq!(check.available, 50_000);
        assert_eq!(check.overage, 0);
    }

    #[tokio::test]
    async fn test_admission_denied_near_allowance() {
        let ledger = ledger();
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "starter", now).await.unwrap();
        ledger.consume(&acct("a"), 49_000, now).await.unwrap();

        let check = ledger.check_availability(&acct("a"), 8_000, now).await.unwrap();
        assert!(!check.admitted);
        assert_eq!(check.available, 1_000);
        assert_eq!(check.overage, 7_000);
    }

    #[tokio::test]
    async fn test_concurrent_consume_sums_exactly() {
        let ledger = Arc::new(ledger());
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "pro", now).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32u64 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.consume(&acct("a"), 100 + i, now).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let expected: u64 = (0..32u64).map(|i| 100 + i).sum();
        let summary = ledger.usage_summary(&acct("a"), now).await.unwrap();
        assert_eq!(summary.tokens_consumed, expected);
        assert_eq!(summary.jobs_recorded, 32);
    }

    #[tokio::test]
    async fn test_consume_retries_version_conflicts() {
        let usage = Arc::new(MemoryUsage::with_conflicts(3));
        let ledger = ledger_with(usage.clone());
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "starter", now).await.unwrap();

        let record = ledger.consume(&acct("a"), 1_234, now).await.unwrap();
        assert_eq!(record.tokens_consumed, 1_234);
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_consume_gives_up_after_bounded_attempts() {
        let usage = Arc::new(MemoryUsage::with_conflicts(MAX_WRITE_ATTEMPTS));
        let ledger = ledger_with(usage);
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "starter", now).await.unwrap();

        let err = ledger.consume(&acct("a"), 10, now).await.unwrap_err();
        assert!(matches!(err, LedgerError::Contended(_)));
    }

    #[tokio::test]
    async fn test_trailing_charge_does_not_count_a_job() {
        let ledger = ledger();
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "starter", now).await.unwrap();
        ledger.consume(&acct("a"), 1_000, now).await.unwrap();
        let record = ledger.consume_trailing(&acct("a"), 250, now).await.unwrap();
        assert_eq!(record.tokens_consumed, 1_250);
        assert_eq!(record.jobs_recorded, 1);
    }

    #[tokio::test]
    async fn test_raise_flag_once_per_period() {
        let ledger = ledger();
        let now = Utc::now();
        ledger.ensure_account(&acct("a"), "starter", now).await.unwrap();

        assert!(ledger.raise_flag(&acct("a"), UsageFlag::ThresholdAlerted, now).await.unwrap());
        assert!(!ledger.raise_flag(&acct("a"), UsageFlag::ThresholdAlerted, now).await.unwrap());
        assert!(ledger.raise_flag(&acct("a"), UsageFlag::OverageFlagged, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_reset_happens_once() {
        let ledger = Arc::new(ledger());
        let opened = at(2026, 1, 10);
        ledger.ensure_account(&acct("a"), "starter", opened).await.unwrap();
        ledger.consume(&acct("a"), 20_000, opened).await.unwrap();

        let later = at(2026, 2, 11);
        let id = acct("a");
        let (first, second) = tokio::join!(
            ledger.reset_period(&id, later),
            ledger.reset_period(&id, later)
        );
        let resets = [first.unwrap(), second.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();
        assert_eq!(resets, 1);

        let summary = ledger.usage_summary(&acct("a"), later).await.unwrap();
        assert_eq!(summary.period_key, "2026-02-10");
        assert_eq!(summary.tokens_consumed, 0);
    }

    #[tokio::test]
    async fn test_reset_with_unknown_tier_leaves_account_untouched() {
        let accounts = Arc::new(MemoryAccounts::default());
        let ledger = UsageLedger::new(
            accounts.clone(),
            Arc::new(MemoryUsage::default()),
            Arc::new(StaticTiers::default()),
        );
        let opened = at(2026, 1, 10);
        accounts
            .save(Account::open(acct("a"), "legacy", opened))
            .await
            .unwrap();

        let err = ledger.reset_period(&acct("a"), at(2026, 2, 11)).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTier(t) if t == "legacy"));
        let account = accounts.get(&acct("a")).await.unwrap().unwrap();
        assert_eq!(account.period_key(), "2026-01-10");
    }

    #[tokio::test]
    async fn test_tier_change_and_reset_both_stick() {
        let ledger = Arc::new(ledger());
        let opened = at(2026, 1, 10);
        let id = acct("a");
        ledger.ensure_account(&id, "starter", opened).await.unwrap();

        let later = at(2026, 2, 11);
        let (changed, reset) = tokio::join!(
            ledger.ensure_account(&id, "pro", opened),
            ledger.reset_period(&id, later)
        );
        changed.unwrap();
        reset.unwrap();

        let account = ledger.account(&id).await.unwrap();
        assert_eq!(account.tier, "pro");
        assert_eq!(account.period_key(), "2026-02-10");
    }

    #[tokio::test]
    async fn test_ensure_account_rolls_elapsed_period() {
        let ledger = ledger();
        ledger.ensure_account(&acct("a"), "starter", at(2026, 1, 10)).await.unwrap();
        ledger.consume(&acct("a"), 5_000, at(2026, 1, 10)).await.unwrap();

        let account = ledger.ensure_account(&acct("a"), "starter", at(2026, 3, 20)).await.unwrap();
        assert_eq!(account.period_key(), "2026-03-10");
        let summary = ledger.usage_summary(&acct("a"), at(2026, 3, 20)).await.unwrap();
        assert_eq!(summary.tokens_consumed, 0);
    }
}
