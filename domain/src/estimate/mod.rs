//! Token estimation
//!
//! Estimates what a consensus job will cost before it runs. The estimate is
//! a pure function of the input size, the requested depth and the number of
//! providers, so the same figure can be shown to a caller ahead of time and
//! used by admission control.

use crate::core::input::{ConsensusInput, Depth};

/// Characters per token used for the size approximation
pub const CHARS_PER_TOKEN: u64 = 4;

/// Prompt scaffolding added to every provider call
pub const SCAFFOLD_TOKENS: u64 = 150;

/// Overhead multiplier, in percent
const OVERHEAD_PERCENT: u64 = 105;

/// Per-depth output budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthProfile {
    pub draft_tokens: u64,
    pub review_tokens: u64,
    pub arbitration_tokens: u64,
    pub minimum_tokens: u64,
}

impl DepthProfile {
    pub fn for_depth(depth: Depth) -> Self {
        match depth {
            Depth::Standard => Self {
                draft_tokens: 1_200,
                review_tokens: 500,
                arbitration_tokens: 1_500,
                minimum_tokens: 4_000,
            },
            Depth::Detailed => Self {
                draft_tokens: 2_400,
                review_tokens: 900,
                arbitration_tokens: 3_000,
                minimum_tokens: 8_000,
            },
        }
    }
}

/// Approximate token count of `chars` characters, rounded up
pub fn tokens_for_chars(chars: usize) -> u64 {
    (chars as u64).div_ceil(CHARS_PER_TOKEN)
}

/// Estimated token cost of one job, broken down by phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimate {
    pub drafting: u64,
    pub review: u64,
    pub arbitration: u64,
    pub total: u64,
}

/// Estimate the total token cost of a job.
///
/// Raw topic and source lengths are taken in characters so the function can
/// be called before an input has been validated.
pub fn estimate_tokens(
    topic_chars: usize,
    source_chars: usize,
    depth: Depth,
    providers: usize,
) -> TokenEstimate {
    let profile = DepthProfile::for_depth(depth);
    let n = providers.max(1) as u64;
    let topic = tokens_for_chars(topic_chars);
    let sources = tokens_for_chars(source_chars);

    let drafting = (SCAFFOLD_TOKENS + topic + sources + profile.draft_tokens) * n;
    let review = (SCAFFOLD_TOKENS + topic + profile.draft_tokens + profile.review_tokens) * n;
    let arbitration = SCAFFOLD_TOKENS
        + topic
        + (profile.draft_tokens + profile.review_tokens) * n
        + profile.arbitration_tokens;

    let raw = drafting + review + arbitration;
    let inflated = (raw * OVERHEAD_PERCENT).div_ceil(100);
    let floor = profile.minimum_tokens + 2 * (topic + sources);

    TokenEstimate {
        drafting,
        review,
        arbitration,
        total: inflated.max(floor),
    }
}

/// Convenience wrapper over [`estimate_tokens`] for a validated input
pub fn estimate_for_input(
    input: &ConsensusInput,
    depth: Depth,
    providers: usize,
) -> TokenEstimate {
    estimate_tokens(input.topic_chars(), input.source_chars(), depth, providers)
}
