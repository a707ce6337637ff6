//! Config-backed subscription tier catalog

use super::file_config::FileTierConfig;
use consensus_application::TierCatalog;
use consensus_domain::SubscriptionTier;
use std::collections::BTreeMap;

/// [`TierCatalog`] built once from the `[tiers.<name>]` tables.
pub struct ConfigTierCatalog {
    tiers: BTreeMap<String, SubscriptionTier>,
}

impl ConfigTierCatalog {
    pub fn from_config(tiers: &BTreeMap<String, FileTierConfig>) -> Self {
        Self {
            tiers: tiers
                .iter()
                .map(|(name, tier)| (name.clone(), tier.to_tier(name)))
                .collect(),
        }
    }
}

impl TierCatalog for ConfigTierCatalog {
    fn tier(&self, name: &str) -> Option<SubscriptionTier> {
        self.tiers.get(name).cloned()
    }

    fn tiers(&self) -> Vec<SubscriptionTier> {
        self.tiers.values().cloned().collect()
    }
}
