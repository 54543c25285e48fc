//! Probability models behind the risk engine.
//!
//! - [`structural`]: bagged `linfa-trees` ensemble over URL structure and
//!   its load-or-train lifecycle.
//! - [`bert`]: pretrained BERT spam classifier run with candle.
//! - [`text`]: lexicon fallback classifier and the neutral-fallback analyzer.

pub mod bert;
pub mod structural;
pub mod text;

/// Score assigned when a model has no usable signal. Not a 50% verdict.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// The one capability the engine needs from any classifier: a probability
/// in `[0, 1]` that the input is malicious.
pub trait ProbabilityModel: Send + Sync {
    type Input: ?Sized;

    fn probability(&self, input: &Self::Input) -> f64;
}
