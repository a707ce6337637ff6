//! Account entity and billing-period arithmetic

use crate::core::error::DomainError;
use chrono::{DateTime, Months, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Validated account identifier supplied by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.len() > 128 {
            return Err(DomainError::validation("account_id", "must be 1-128 characters"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account with its current billing window (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Name of the subscription tier in the tier catalog
    pub tier: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Where usage notifications go
    pub recipient: String,
}

impl Account {
    /// Open an account whose first period starts at the beginning of `now`'s day.
    pub fn open(id: AccountId, tier: impl Into<String>, now: DateTime<Utc>) -> Self {
        let period_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let period_end = next_period_end(period_start);
        let recipient = id.as_str().to_string();
        Self {
            id,
            tier: tier.into(),
            period_start,
            period_end,
            recipient,
        }
    }

    /// Stable key of the current period (`YYYY-MM-DD` of its start)
    pub fn period_key(&self) -> String {
        self.period_start.format("%Y-%m-%d").to_string()
    }

    pub fn period_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.period_end <= now
    }

    /// Advance the billing window until it contains `now`.
    ///
    /// Returns how many periods were skipped; zero means the window was
    /// already current and nothing changed.
    pub fn roll_period(&mut self, now: DateTime<Utc>) -> u32 {
        let mut advanced = 0;
        while self.period_end <= now {
            self.period_start = self.period_end;
            self.period_end = next_period_end(self.period_start);
            advanced += 1;
        }
        advanced
    }
}

fn next_period_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(1))
        .unwrap_or(start + chrono::Duration::days(30))
}
