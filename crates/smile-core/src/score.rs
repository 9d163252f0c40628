//! Smile score aggregation.

use crate::types::FinalScore;

/// Sub-scores at or above this value are boosted.
const BOOST_THRESHOLD: f64 = 91.0;
/// Flat contribution of a boosted sub-score before its quadratic bonus.
const BOOST_BASE: f64 = 90.0;
const BOOST_DIVISOR: f64 = 10.0;
/// Aggregate is normalized against this many sub-scores.
const NORMALIZER: f64 = 3.0;

/// Contribution of a single sub-score to the total.
///
/// Below 91 a score counts as itself; above that it counts as
/// `90 + (s - 90)² / 10`, so 95 contributes 92.5 and 100 contributes 100.
pub fn contribution(score: f64) -> f64 {
    if score < BOOST_THRESHOLD {
        return score;
    }
    let sub = score - BOOST_BASE;
    BOOST_BASE + (sub * sub) / BOOST_DIVISOR
}

/// Fold sub-scores (each 0–100) into the final smile score.
///
/// The total is divided by three and rounded to the nearest integer. An
/// empty sequence scores 0.
pub fn aggregate(scores: &[f64]) -> FinalScore {
    let total: f64 = scores.iter().copied().map(contribution).sum();
    // f64::round is half-away-from-zero, which is half-up for non-negative totals.
    let rounded = (total / NORMALIZER).round();
    if rounded.is_finite() && rounded > 0.0 {
        rounded as FinalScore
    } else {
        0
    }
}
