//! Weighted-sum combination
//!
//! ```text
//! raw = Σ weight[name] × signal[name]
//! ```
//!
//! Only names present in `inputs` contribute. The caller has already filled
//! or dropped missing names according to its missing-signal policy and
//! restricted the weights to match.

use homeostat_common::{SignalSet, WeightVector};

/// Raw (unclamped) weighted sum of `inputs`
#[inline]
pub fn weighted_sum(weights: &WeightVector, inputs: &SignalSet) -> f64 {
    inputs
        .iter()
        .map(|(name, value)| weights.get(name) * value)
        .sum()
}
