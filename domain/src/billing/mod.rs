//! Billing subdomain: tiers, accounts, usage records and admission policy.

pub mod account;
pub mod admission;
pub mod tier;
pub mod usage;

pub use account::{Account, AccountId};
pub use admission::{AvailabilityCheck, check_availability};
pub use tier::{BillingType, SubscriptionTier};
pub use usage::{UsageRecord, UsageSummary};
