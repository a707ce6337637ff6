//! Confidence heuristic
//!
//! Confidence rewards breadth: it grows with the number of providers whose
//! drafts survived Phase 1 and shrinks for every review that went missing in
//! Phase 2. It says nothing about semantic agreement between drafts.

pub const MIN_CONFIDENCE: f64 = 0.5;
pub const MAX_CONFIDENCE: f64 = 0.95;
const PER_PROVIDER: f64 = 0.15;
const PER_MISSING_REVIEW: f64 = 0.05;

/// `min(0.95, 0.5 + 0.15 × drafts)`, minus 0.05 per missing review,
/// clamped to `[0.5, 0.95]`
pub fn confidence(successful_drafts: usize, missing_reviews: usize) -> f64 {
    let breadth = (MIN_CONFIDENCE + PER_PROVIDER * successful_drafts as f64).min(MAX_CONFIDENCE);
    (breadth - PER_MISSING_REVIEW * missing_reviews as f64).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}
