//! WeightVector - per-signal combination weights
//!
//! Invariant: every weight is finite and non-negative and the weights sum to
//! 1.0 (within [`WEIGHT_SUM_TOLERANCE`]). A degenerate vector (all zero or
//! non-finite) is never kept; it is reset to uniform weights instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::signal::SignalName;
use crate::error::{ConfigError, HomeostatError, WeightError};
use crate::WEIGHT_SUM_TOLERANCE;

/// Sums below this are treated as a collapse to zero
const DEGENERATE_SUM: f64 = 1e-12;

/// Normalized, non-negative weights keyed by signal name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector {
    weights: BTreeMap<SignalName, f64>,
}

impl WeightVector {
    /// Build from raw weights, validating and normalizing them
    pub fn new<I>(raw: I) -> Result<Self, HomeostatError>
    where
        I: IntoIterator<Item = (SignalName, f64)>,
    {
        let mut weights = BTreeMap::new();
        for (name, weight) in raw {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: name.to_string(),
                    weight,
                }
                .into());
            }
            weights.insert(name, weight);
        }

        let mut vector = Self { weights };
        vector.normalize()?;
        Ok(vector)
    }

    /// Equal weights over the given names
    pub fn uniform(names: &[SignalName]) -> Self {
        let share = if names.is_empty() {
            0.0
        } else {
            1.0 / names.len() as f64
        };
        Self {
            weights: names.iter().map(|name| (*name, share)).collect(),
        }
    }

    /// Weight for a name, 0.0 when the name is not weighted
    #[inline]
    pub fn get(&self, name: SignalName) -> f64 {
        self.weights.get(&name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, name: SignalName) -> bool {
        self.weights.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = SignalName> + '_ {
        self.weights.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalName, f64)> + '_ {
        self.weights.iter().map(|(name, weight)| (*name, *weight))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Check the sum-to-one invariant
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Scale weights so they sum to 1.0
    ///
    /// Negative or non-finite entries are floored at zero first.
    pub fn normalize(&mut self) -> Result<(), WeightError> {
        if self.weights.is_empty() {
            return Err(WeightError::Empty);
        }

        for weight in self.weights.values_mut() {
            if !weight.is_finite() || *weight < 0.0 {
                *weight = 0.0;
            }
        }

        let sum = self.sum();
        if !sum.is_finite() || sum <= DEGENERATE_SUM {
            return Err(WeightError::RenormalizationDegenerate { sum });
        }

        for weight in self.weights.values_mut() {
            *weight /= sum;
        }
        Ok(())
    }

    /// Normalize, falling back to uniform weights on collapse
    ///
    /// Returns `true` when the vector had to be reset.
    pub fn renormalize_or_reset(&mut self) -> bool {
        match self.normalize() {
            Ok(()) => false,
            Err(WeightError::Empty) => false,
            Err(err) => {
                warn!(error = %err, "Weight renormalization degenerate, resetting to uniform");
                let names: Vec<_> = self.names().collect();
                *self = Self::uniform(&names);
                true
            }
        }
    }

    /// Weights restricted to `names` and renormalized over that subset
    ///
    /// Names without a weight are ignored. If the subset carries no mass the
    /// result is uniform over the weighted names that were requested.
    pub fn restricted_to(&self, names: &[SignalName]) -> Self {
        let mut subset = Self {
            weights: names
                .iter()
                .filter_map(|name| self.weights.get(name).map(|w| (*name, *w)))
                .collect(),
        };
        if subset.normalize().is_err() {
            let kept: Vec<_> = subset.names().collect();
            subset = Self::uniform(&kept);
        }
        subset
    }

    /// Exponential moving average toward `target`
    ///
    /// `smoothing` is the weight on the current value. Names missing from
    /// `target` decay toward zero. The result is renormalized.
    pub fn blend(&self, target: &WeightVector, smoothing: f64) -> Self {
        let mut blended = Self {
            weights: self
                .weights
                .iter()
                .map(|(name, current)| {
                    let goal = target.get(*name);
                    (*name, smoothing * current + (1.0 - smoothing) * goal)
                })
                .collect(),
        };
        blended.renormalize_or_reset();
        blended
    }

    /// Element-wise mean of several vectors, renormalized
    pub fn average<'a, I>(vectors: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a WeightVector>,
    {
        let mut totals: BTreeMap<SignalName, f64> = BTreeMap::new();
        let mut count = 0usize;
        for vector in vectors {
            for (name, weight) in vector.iter() {
                *totals.entry(name).or_insert(0.0) += weight;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let mut mean = Self {
            weights: totals
                .into_iter()
                .map(|(name, total)| (name, total / count as f64))
                .collect(),
        };
        mean.renormalize_or_reset();
        Some(mean)
    }

    /// Overwrite a weight without renormalizing
    ///
    /// Callers must finish with [`WeightVector::renormalize_or_reset`].
    pub fn set_unnormalized(&mut self, name: SignalName, weight: f64) {
        self.weights.insert(name, weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes() {
        let weights = WeightVector::new([
            (SignalName::Task, 2.0),
            (SignalName::Stability, 1.0),
            (SignalName::Diversity, 1.0),
        ])
        .unwrap();
        assert!((weights.get(SignalName::Task) - 0.5).abs() < 1e-12);
        assert!(weights.is_normalized());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = WeightVector::new([(SignalName::Task, -0.1)]).unwrap_err();
        assert!(matches!(
            err,
            HomeostatError::Config(ConfigError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_all_zero_is_degenerate() {
        let err = WeightVector::new([(SignalName::Task, 0.0), (SignalName::Stability, 0.0)])
            .unwrap_err();
        assert!(matches!(
            err,
            HomeostatError::Weight(WeightError::RenormalizationDegenerate { .. })
        ));
    }

    #[test]
    fn test_reset_to_uniform_on_collapse() {
        let mut weights = WeightVector::uniform(&[SignalName::Task, SignalName::Stability]);
        weights.set_unnormalized(SignalName::Task, 0.0);
        weights.set_unnormalized(SignalName::Stability, f64::NAN);

        assert!(weights.renormalize_or_reset());
        assert!((weights.get(SignalName::Task) - 0.5).abs() < 1e-12);
        assert!((weights.get(SignalName::Stability) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_restricted_to_subset() {
        let weights = WeightVector::new([
            (SignalName::Task, 0.5),
            (SignalName::Stability, 0.3),
            (SignalName::Diversity, 0.2),
        ])
        .unwrap();
        let subset = weights.restricted_to(&[SignalName::Task, SignalName::Diversity]);
        assert_eq!(subset.len(), 2);
        assert!((subset.get(SignalName::Task) - 0.5 / 0.7).abs() < 1e-12);
        assert!(subset.is_normalized());
    }

    #[test]
    fn test_blend_moves_toward_target() {
        let current = WeightVector::uniform(&[SignalName::Task, SignalName::Stability]);
        let target = WeightVector::new([(SignalName::Task, 1.0), (SignalName::Stability, 0.0)])
            .unwrap();
        let blended = current.blend(&target, 0.9);
        assert!((blended.get(SignalName::Task) - 0.55).abs() < 1e-12);
        assert!(blended.is_normalized());
    }

    #[test]
    fn test_average() {
        let a = WeightVector::new([(SignalName::Task, 1.0), (SignalName::Stability, 0.0)]).unwrap();
        let b = WeightVector::new([(SignalName::Task, 0.0), (SignalName::Stability, 1.0)]).unwrap();
        let mean = WeightVector::average([&a, &b]).unwrap();
        assert!((mean.get(SignalName::Task) - 0.5).abs() < 1e-12);
        assert!(WeightVector::average(std::iter::empty()).is_none());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn blend_keeps_weights_normalized(
                current in proptest::collection::vec(0.0f64..10.0, 4),
                target in proptest::collection::vec(0.0f64..10.0, 4),
                smoothing in 0.0f64..1.0,
            ) {
                let names = [
                    SignalName::Task,
                    SignalName::Stability,
                    SignalName::Diversity,
                    SignalName::Plasticity,
                ];
                let mut a = WeightVector::uniform(&names);
                let mut b = WeightVector::uniform(&names);
                for (i, name) in names.iter().enumerate() {
                    a.set_unnormalized(*name, current[i]);
                    b.set_unnormalized(*name, target[i]);
                }
                a.renormalize_or_reset();
                b.renormalize_or_reset();

                let blended = a.blend(&b, smoothing);
                prop_assert!(blended.is_normalized());
                prop_assert!(blended.iter().all(|(_, w)| w >= 0.0));
            }
        }
    }
}
