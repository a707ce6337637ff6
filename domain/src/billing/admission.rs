//! Admission policy
//!
//! Pure decision of whether a job with a given token estimate may start,
//! given the account's tier and what it already consumed this period.

use super::tier::SubscriptionTier;
use serde::{Deserialize, Serialize};

/// Fraction of the estimate that may be covered by overage
pub const OVERAGE_TOLERANCE: f64 = 0.5;

/// Hard cap on an admitted estimate relative to the remaining allowance
pub const MAX_ESTIMATE_RATIO: f64 = 1.5;

/// Outcome of an availability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    /// Remaining allowance covers the whole estimate
    pub sufficient: bool,
    /// Job may start (possibly running into overage)
    pub admitted: bool,
    pub required: u64,
    pub available: u64,
    /// Tokens of the estimate not covered by the remaining allowance
    pub overage: u64,
}

/// Decide admission for `estimate` tokens.
///
/// A metered account is admitted when the remaining allowance covers the
/// estimate, or when the shortfall is at most half the estimate *and* the
/// estimate is at most 150% of what remains. Pay-per-use accounts are always
/// admitted and the whole estimate counts as overage.
pub fn check_availability(
    tier: &SubscriptionTier,
    consumed: u64,
    estimate: u64,
) -> AvailabilityCheck {
    if tier.is_pay_per_use() {
        return AvailabilityCheck {
            sufficient: false,
            admitted: true,
            required: estimate,
            available: 0,
            overage: estimate,
        };
    }

    let available = tier.allowance().saturating_sub(consumed);
    if available >= estimate {
        return AvailabilityCheck {
            sufficient: true,
            admitted: true,
            required: estimate,
            available,
            overage: 0,
        };
    }

    let shortfall = estimate - available;
    let within_tolerance = shortfall as f64 <= OVERAGE_TOLERANCE * estimate as f64;
    let within_cap = estimate as f64 <= MAX_ESTIMATE_RATIO * available as f64;

    AvailabilityCheck {
        sufficient: false,
        admitted: within_tolerance && within_cap,
        required: estimate,
        available,
        overage: shortfall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starter() -> SubscriptionTier {
        SubscriptionTier::metered("starter", 50_000, 2)
    }

    #[test]
    fn test_fresh_account_is_admitted() {
        let check = check_availability(&starter(), 0, 8_000);
        assert!(check.sufficient);
        assert!(check.admitted);
        assert_eq!(check.available, 50_000);
        assert_eq!(check.overage, 0);
    }

    #[test]
    fn test_large_shortfall_is_denied() {
        let check = check_availability(&starter(), 49_000, 8_000);
        assert!(!check.admitted);
        assert_eq!(check.required, 8_000);
        assert_eq!(check.available, 1_000);
        assert_eq!(check.overage, 7_000);
    }

    #[test]
    fn test_small_shortfall_is_tolerated() {
        // 7,000 remaining, 10,000 requested: shortfall 3,000 <= 5,000 and 10k <= 10.5k
        let check = check_availability(&starter(), 43_000, 10_000);
        assert!(!check.sufficient);
        assert!(check.admitted);
        assert_eq!(check.overage, 3_000);
    }

    #[test]
    fn test_never_admits_beyond_150_percent_of_remaining() {
        let tier = starter();
        for consumed in (0..=50_000).step_by(2_500) {
            for estimate in (1..=60_000).step_by(1_700) {
                let check = check_availability(&tier, consumed, estimate);
                if check.admitted {
                    assert!(
                        estimate as f64 <= 1.5 * check.available as f64,
                        "admitted {} with only {} available",
                        estimate,
                        check.available
                    );
                }
            }
        }
    }

    #[test]
    fn test_exhausted_allowance_denies_everything() {
        let check = check_availability(&starter(), 60_000, 1);
        assert!(!check.admitted);
        assert_eq!(check.available, 0);
    }

    #[test]
    fn test_pay_per_use_always_admitted() {
        let tier = SubscriptionTier::pay_per_use("payg", 4);
        let check = check_availability(&tier, 10_000_000, 9_000);
        assert!(check.admitted);
        assert_eq!(check.overage, 9_000);
    }
}
