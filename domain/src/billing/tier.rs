//! Subscription tier reference data

use serde::{Deserialize, Serialize};

/// How a tier is billed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillingType {
    /// Fixed price with an included allowance; usage above it is overage
    #[default]
    MeteredSubscription,
    /// No allowance; every token is billed at the overage rate
    PayPerUse,
}

impl BillingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingType::MeteredSubscription => "metered-subscription",
            BillingType::PayPerUse => "pay-per-use",
        }
    }
}

/// A subscription tier (immutable reference data)
///
/// The billing subsystem is the source of truth; this is the read-only
/// projection the ledger needs to compute allowance and overage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTier {
    pub name: String,
    /// Tokens included per billing period
    pub included_tokens: u64,
    /// Reports included per billing period (informational)
    pub included_reports: u32,
    /// Period price in cents
    pub price_cents: u64,
    /// Overage price in cents per 1,000 tokens
    pub overage_rate_cents_per_1k: u64,
    pub billing_type: BillingType,
}

impl SubscriptionTier {
    pub fn metered(name: impl Into<String>, included_tokens: u64, overage_rate: u64) -> Self {
        Self {
            name: name.into(),
            included_tokens,
            included_reports: 0,
            price_cents: 0,
            overage_rate_cents_per_1k: overage_rate,
            billing_type: BillingType::MeteredSubscription,
        }
    }

    pub fn pay_per_use(name: impl Into<String>, rate: u64) -> Self {
        Self {
            name: name.into(),
            included_tokens: 0,
            included_reports: 0,
            price_cents: 0,
            overage_rate_cents_per_1k: rate,
            billing_type: BillingType::PayPerUse,
        }
    }

    /// Allowance that counts against consumption before overage starts
    pub fn allowance(&self) -> u64 {
        match self.billing_type {
            BillingType::MeteredSubscription => self.included_tokens,
            BillingType::PayPerUse => 0,
        }
    }

    pub fn is_pay_per_use(&self) -> bool {
        self.billing_type == BillingType::PayPerUse
    }

    /// Tokens consumed beyond the allowance
    pub fn overage_tokens(&self, consumed: u64) -> u64 {
        consumed.saturating_sub(self.allowance())
    }

    /// Notional overage charge in cents, rounded up
    pub fn overage_cost_cents(&self, overage_tokens: u64) -> u64 {
        (overage_tokens.saturating_mul(self.overage_rate_cents_per_1k)).div_ceil(1000)
    }
}
