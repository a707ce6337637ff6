//! Notification port
//!
//! The notification subsystem is external; the scheduler only asks it to
//! deliver a templated message with the account's usage figures.

use async_trait::async_trait;
use consensus_domain::UsageSummary;
use thiserror::Error;

/// Usage reached the alert threshold
pub const TEMPLATE_USAGE_THRESHOLD: &str = "usage-threshold";
/// Usage passed the included allowance
pub const TEMPLATE_USAGE_OVERAGE: &str = "usage-overage";
/// A new billing period started
pub const TEMPLATE_PERIOD_RESET: &str = "usage-period-reset";

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: String,
    pub template_id: &'static str,
    pub stats: UsageSummary,
}

#[derive(Error, Debug)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}
