//! Usage record and derived usage summary

use super::account::{Account, AccountId};
use super::tier::SubscriptionTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-account, per-period token counter (Entity)
///
/// `version` is bumped on every write and used by repositories for
/// compare-and-swap updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub account_id: AccountId,
    pub period_key: String,
    pub tokens_consumed: u64,
    pub overage_tokens: u64,
    /// Summary of the derived overage charge, refreshed on every write
    pub overage_cost_cents: u64,
    pub jobs_recorded: u32,
    pub threshold_alerted: bool,
    pub overage_flagged: bool,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(account_id: AccountId, period_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            period_key: period_key.into(),
            tokens_consumed: 0,
            overage_tokens: 0,
            overage_cost_cents: 0,
            jobs_recorded: 0,
            threshold_alerted: false,
            overage_flagged: false,
            version: 0,
            updated_at: now,
        }
    }

    pub fn for_account(account: &Account, now: DateTime<Utc>) -> Self {
        Self::new(account.id.clone(), account.period_key(), now)
    }

    /// Charge one finished job and refresh the overage summary fields.
    pub fn apply_consumption(&mut self, tokens: u64, tier: &SubscriptionTier, now: DateTime<Utc>) {
        self.jobs_recorded = self.jobs_recorded.saturating_add(1);
        self.add_tokens(tokens, tier, now);
    }

    /// Add tokens without counting a job, e.g. calls that settled after
    /// their job was already charged.
    pub fn add_tokens(&mut self, tokens: u64, tier: &SubscriptionTier, now: DateTime<Utc>) {
        self.tokens_consumed = self.tokens_consumed.saturating_add(tokens);
        self.refresh_overage(tier);
        self.updated_at = now;
    }

    pub fn refresh_overage(&mut self, tier: &SubscriptionTier) {
        self.overage_tokens = tier.overage_tokens(self.tokens_consumed);
        self.overage_cost_cents = tier.overage_cost_cents(self.overage_tokens);
    }

    /// Consumption as a percentage of the tier allowance.
    ///
    /// Pay-per-use tiers have no allowance and always report 0.
    pub fn usage_percent(&self, tier: &SubscriptionTier) -> f64 {
        let allowance = tier.allowance();
        if allowance == 0 {
            return 0.0;
        }
        self.tokens_consumed as f64 / allowance as f64 * 100.0
    }
}

/// Read model combining an account, its tier and its current usage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub account_id: String,
    pub tier: String,
    pub billing_type: String,
    pub period_key: String,
    pub period_end: DateTime<Utc>,
    pub tokens_consumed: u64,
    pub allowance: u64,
    pub available: u64,
    pub usage_percent: f64,
    pub overage_tokens: u64,
    pub overage_cost_cents: u64,
    pub jobs_recorded: u32,
}

impl UsageSummary {
    pub fn build(account: &Account, tier: &SubscriptionTier, record: &UsageRecord) -> Self {
        let overage_tokens = tier.overage_tokens(record.tokens_consumed);
        Self {
            account_id: account.id.to_string(),
            tier: tier.name.clone(),
            billing_type: tier.billing_type.as_str().to_string(),
            period_key: record.period_key.clone(),
            period_end: account.period_end,
            tokens_consumed: record.tokens_consumed,
            allowance: tier.allowance(),
            available: tier.allowance().saturating_sub(record.tokens_consumed),
            usage_percent: record.usage_percent(tier),
            overage_tokens,
            overage_cost_cents: tier.overage_cost_cents(overage_tokens),
            jobs_recorded: record.jobs_recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UsageRecord {
        UsageRecord::new(AccountId::new("acct").unwrap(), "2026-01-01", Utc::now())
    }

    #[test]
    fn test_apply_consumption_tracks_overage() {
        let tier = SubscriptionTier::metered("starter", 50_000, 2);
        let mut usage = record();

        usage.apply_consumption(49_000, &tier, Utc::now());
        assert_eq!(usage.overage_tokens, 0);

        usage.apply_consumption(3_500, &tier, Utc::now());
        assert_eq!(usage.tokens_consumed, 52_500);
        assert_eq!(usage.overage_tokens, 2_500);
        assert_eq!(usage.overage_cost_cents, 5);
        assert_eq!(usage.jobs_recorded, 2);

        usage.add_tokens(500, &tier, Utc::now());
        assert_eq!(usage.tokens_consumed, 53_000);
        assert_eq!(usage.jobs_recorded, 2);
    }

    #[test]
    fn test_usage_percent() {
        let tier = SubscriptionTier::metered("starter", 40_000, 2);
        let mut usage = record();
        usage.apply_consumption(30_000, &tier, Utc::now());
        assert!((usage.usage_percent(&tier) - 75.0).abs() < f64::EPSILON);

        let payg = SubscriptionTier::pay_per_use("payg", 4);
        assert_eq!(usage.usage_percent(&payg), 0.0);
    }
}
