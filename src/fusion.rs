use crate::models::{Fusion, RiskTier};

/// Weight of the structural (URL-syntax) score in the fused score.
pub const STRUCTURAL_WEIGHT: f64 = 0.6;
/// Weight of the text score in the fused score.
pub const TEXT_WEIGHT: f64 = 0.4;

/// Fused scores strictly above this are [`RiskTier::High`].
pub const HIGH_THRESHOLD: f64 = 0.75;
/// Fused scores strictly above this (and not High) are [`RiskTier::Medium`].
pub const MEDIUM_THRESHOLD: f64 = 0.4;

/// Combine the structural and text probabilities into one score and tier.
///
/// The weights are fixed policy, not learned.
pub fn fuse(structural_score: f64, text_score: f64) -> Fusion {
    let score = STRUCTURAL_WEIGHT * structural_score + TEXT_WEIGHT * text_score;
    Fusion {
        score,
        tier: tier_for(score),
    }
}

/// Map a fused score to its tier.
///
/// | score            | tier   |
/// |------------------|--------|
/// | `> 0.75`         | High   |
/// | `(0.4, 0.75]`    | Medium |
/// | `<= 0.4`         | Low    |
pub fn tier_for(score: f64) -> RiskTier {
    if score > HIGH_THRESHOLD {
        RiskTier::High
    } else if score > MEDIUM_THRESHOLD {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}
