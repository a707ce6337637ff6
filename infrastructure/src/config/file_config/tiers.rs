//! Subscription tier configuration from TOML (`[tiers.<name>]` tables)

use crate::config::validation::{ConfigIssue, ConfigIssueCode};
use consensus_domain::{BillingType, SubscriptionTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `[tiers.<name>]` table; the table key is the tier name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTierConfig {
    pub billing_type: BillingType,
    /// Tokens included per billing period
    pub included_tokens: u64,
    pub included_reports: u32,
    pub price_cents: u64,
    pub overage_rate_cents_per_1k: u64,
}

impl Default for FileTierConfig {
    fn default() -> Self {
        Self {
            billing_type: BillingType::MeteredSubscription,
            included_tokens: 0,
            included_reports: 0,
            price_cents: 0,
            overage_rate_cents_per_1k: 0,
        }
    }
}

impl FileTierConfig {
    fn metered(included_tokens: u64, included_reports: u32, price_cents: u64, rate: u64) -> Self {
        Self {
            billing_type: BillingType::MeteredSubscription,
            included_tokens,
            included_reports,
            price_cents,
            overage_rate_cents_per_1k: rate,
        }
    }

    pub fn to_tier(&self, name: &str) -> SubscriptionTier {
        SubscriptionTier {
            name: name.to_string(),
            included_tokens: self.included_tokens,
            included_reports: self.included_reports,
            price_cents: self.price_cents,
            overage_rate_cents_per_1k: self.overage_rate_cents_per_1k,
            billing_type: self.billing_type,
        }
    }
}

/// Tiers shipped with the server; file tables with the same name override them.
pub fn default_tiers() -> BTreeMap<String, FileTierConfig> {
    BTreeMap::from([
        ("starter".to_string(), FileTierConfig::metered(50_000, 5, 1_900, 2)),
        ("professional".to_string(), FileTierConfig::metered(500_000, 50, 9_900, 1)),
        ("enterprise".to_string(), FileTierConfig::metered(5_000_000, 500, 49_900, 1)),
        (
            "pay-per-use".to_string(),
            FileTierConfig {
                billing_type: BillingType::PayPerUse,
                overage_rate_cents_per_1k: 3,
                ..Default::default()
            },
        ),
    ])
}

pub fn validate_tiers(tiers: &BTreeMap<String, FileTierConfig>) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    if tiers.is_empty() {
        issues.push(ConfigIssue::error(
            ConfigIssueCode::NoTiers,
            "tiers: at least one subscription tier is required",
        ));
    }
    for (name, tier) in tiers {
        if tier.billing_type == BillingType::MeteredSubscription && tier.included_tokens == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: format!("tiers.{name}.included_tokens"),
                    value: "0".to_string(),
                },
                format!("tiers.{name}: metered tier with no allowance admits almost nothing"),
            ));
        }
        if tier.billing_type == BillingType::PayPerUse && tier.overage_rate_cents_per_1k == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: format!("tiers.{name}.overage_rate_cents_per_1k"),
                    value: "0".to_string(),
                },
                format!("tiers.{name}: pay-per-use tier with a zero rate is free"),
            ));
        }
    }
    issues
}
