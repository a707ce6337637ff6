//! Notifier that hands usage notifications to the log pipeline.
//!
//! Delivery (email, webhooks) belongs to the notification subsystem, which
//! tails these structured records.

use async_trait::async_trait;
use consensus_application::{Notification, Notifier, NotifyError};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let stats = &notification.stats;
        info!(
            target: "consensus::notify",
            recipient = %notification.recipient,
            template = notification.template_id,
            account = %stats.account_id,
            tier = %stats.tier,
            period = %stats.period_key,
            consumed = stats.tokens_consumed,
            allowance = stats.allowance,
            usage_percent = stats.usage_percent,
            overage_tokens = stats.overage_tokens,
            overage_cost_cents = stats.overage_cost_cents,
            "Usage notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use consensus_application::ports::notifier::TEMPLATE_USAGE_THRESHOLD;
    use consensus_domain::UsageSummary;

    #[tokio::test]
    async fn test_notify_always_succeeds() {
        let notification = Notification {
            recipient: "billing@example.com".to_string(),
            template_id: TEMPLATE_USAGE_THRESHOLD,
            stats: UsageSummary {
                account_id: "acct-1".to_string(),
                tier: "starter".to_string(),
                billing_type: "metered-subscription".to_string(),
                period_key: "2026-10".to_string(),
                period_end: Utc::now(),
                tokens_consumed: 40_000,
                allowance: 50_000,
                available: 10_000,
                usage_percent: 80.0,
                overage_tokens: 0,
                overage_cost_cents: 0,
                jobs_recorded: 12,
            },
        };
        assert!(TracingNotifier.notify(notification).await.is_ok());
    }
}
