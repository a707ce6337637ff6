//! Subscription tier catalog port
//!
//! The billing subsystem owns tier definitions; the ledger only reads them.

use consensus_domain::SubscriptionTier;

pub trait TierCatalog: Send + Sync {
    /// Look up a tier by name
    fn tier(&self, name: &str) -> Option<SubscriptionTier>;

    /// All known tiers
    fn tiers(&self) -> Vec<SubscriptionTier>;
}
