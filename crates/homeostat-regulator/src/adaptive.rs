//! AdaptiveWeightUpdater - slow, damped re-weighting of signals
//!
//! Every `update_every` observed rewards the updater proposes a target vector:
//!
//! ```text
//! corr     = pearson(signal, task reward) over steps reporting the signal
//! target_n = w_n × (1 + lr × corr)            (× (1 - lr) when saturated)
//! ```
//!
//! The target is renormalized and then blended into the current weights with
//! an exponential moving average, so a single noisy window cannot swing them.
//!
//! Correlating levels over a window measures whether a signal moves with the
//! reward, i.e. whether their trends agree, without differencing noise.

use std::collections::VecDeque;

use homeostat_common::{
    sanitize_unit, ConfigError, SignalName, SignalSet, WeightVector, DEFAULT_SMOOTHING,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::history::SignalHistory;

/// Fewer aligned samples than this yield no correlation
const MIN_CORRELATION_SAMPLES: usize = 3;

/// Tuning for the adaptive policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    /// Step size of the multiplicative target adjustment
    pub learning_rate: f64,
    /// Recompute weights once per this many observed rewards
    pub update_every: u32,
    /// EMA weight on the current vector, in [0, 1)
    pub smoothing: f64,
    /// Samples used for the signal/reward correlation
    pub correlation_window: usize,
    /// Rewards needed before the first adjustment
    pub min_samples: usize,
    /// Windowed mean at or above which a signal counts as saturated
    pub saturation_level: f64,
    /// Windowed variance at or below which a high signal counts as saturated
    pub saturation_variance: f64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            update_every: 1,
            smoothing: DEFAULT_SMOOTHING,
            correlation_window: 10,
            min_samples: 5,
            saturation_level: 0.95,
            saturation_variance: 1e-4,
        }
    }
}

impl AdaptiveSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.learning_rate.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "adaptive.learning_rate",
                value: self.learning_rate,
            });
        }
        if !(0.0..1.0).contains(&self.learning_rate) {
            return Err(ConfigError::OutOfUnitRange {
                field: "adaptive.learning_rate",
                value: self.learning_rate,
            });
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(ConfigError::InvalidSmoothing(self.smoothing));
        }
        if self.update_every == 0 {
            return Err(ConfigError::ZeroValue {
                field: "adaptive.update_every",
            });
        }
        if self.correlation_window < MIN_CORRELATION_SAMPLES {
            return Err(ConfigError::ZeroValue {
                field: "adaptive.correlation_window",
            });
        }
        if !(0.0..=1.0).contains(&self.saturation_level) {
            return Err(ConfigError::OutOfUnitRange {
                field: "adaptive.saturation_level",
                value: self.saturation_level,
            });
        }
        if !self.saturation_variance.is_finite() || self.saturation_variance < 0.0 {
            return Err(ConfigError::NonFinite {
                field: "adaptive.saturation_variance",
                value: self.saturation_variance,
            });
        }
        Ok(())
    }
}

/// Signals and task reward observed on the same step
#[derive(Debug, Clone)]
struct AlignedSample {
    signals: SignalSet,
    reward: f64,
}

/// Owns the live weight vector of the adaptive policy
#[derive(Debug, Clone)]
pub struct AdaptiveWeightUpdater {
    settings: AdaptiveSettings,
    weights: WeightVector,
    samples: VecDeque<AlignedSample>,
    sample_capacity: usize,
    observed: u64,
    updates: u64,
    resets: u64,
}

impl AdaptiveWeightUpdater {
    pub fn new(initial: WeightVector, settings: AdaptiveSettings, sample_capacity: usize) -> Self {
        let sample_capacity = sample_capacity.max(settings.correlation_window).max(1);
        Self {
            settings,
            weights: initial,
            samples: VecDeque::with_capacity(sample_capacity),
            sample_capacity,
            observed: 0,
            updates: 0,
            resets: 0,
        }
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn settings(&self) -> &AdaptiveSettings {
        &self.settings
    }

    /// Number of adjustments applied so far
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Number of times the target collapsed and was reset to uniform
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Replace the live weights, e.g. from a persisted snapshot
    pub fn set_weights(&mut self, weights: WeightVector) {
        self.weights = weights;
    }

    /// Record `task_reward` and, on cadence, adjust the weights
    ///
    /// `signals` is the set combined this step; only signals present in it
    /// are adjusted. `history` must already contain this step's values.
    pub fn update(
        &mut self,
        signals: &SignalSet,
        task_reward: f64,
        history: &SignalHistory,
    ) -> &WeightVector {
        if !task_reward.is_finite() {
            warn!(task_reward, "Skipping non-finite task reward");
            return &self.weights;
        }

        if self.samples.len() == self.sample_capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(AlignedSample {
            signals: signals
                .iter()
                .filter_map(|(name, value)| sanitize_unit(value).map(|v| (name, v)))
                .collect(),
            reward: task_reward,
        });
        self.observed += 1;

        if self.observed % u64::from(self.settings.update_every) != 0
            || self.samples.len() < self.settings.min_samples
        {
            return &self.weights;
        }

        let mut target = self.weights.clone();
        let names: Vec<SignalName> = self.weights.names().collect();
        for name in names {
            if !signals.contains(name) {
                continue;
            }
            let factor = self.adjustment(name, history);
            target.set_unnormalized(name, self.weights.get(name) * factor);
        }

        if target.renormalize_or_reset() {
            self.resets += 1;
        }
        self.weights = self.weights.blend(&target, self.settings.smoothing);
        self.updates += 1;

        debug!(
            updates = self.updates,
            weights = ?self.weights,
            "Adaptive weights updated"
        );
        &self.weights
    }

    /// Multiplicative adjustment for one signal
    ///
    /// Only steps on which the signal was reported are paired with rewards.
    fn adjustment(&self, name: SignalName, history: &SignalHistory) -> f64 {
        let lr = self.settings.learning_rate;
        let (xs, ys): (Vec<f64>, Vec<f64>) = self
            .samples
            .iter()
            .rev()
            .filter_map(|sample| sample.signals.get(name).map(|x| (x, sample.reward)))
            .take(self.settings.correlation_window)
            .unzip();

        let corr = if xs.len() >= MIN_CORRELATION_SAMPLES {
            pearson(&xs, &ys)
        } else {
            0.0
        };

        let mut factor = 1.0 + lr * corr;
        let saturated = history.len(name) > 0
            && history.mean(name) >= self.settings.saturation_level
            && history.variance(name) <= self.settings.saturation_variance;
        if saturated {
            factor *= 1.0 - lr;
        }
        factor
    }
}

/// Pearson correlation; 0.0 when either side is constant
pub(crate) fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut x_var = 0.0;
    let mut y_var = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - x_mean;
        let dy = y - y_mean;
        cov += dx * dy;
        x_var += dx * dx;
        y_var += dy * dy;
    }

    let denom = (x_var * y_var).sqrt();
    if denom <= f64::EPSILON || !denom.is_finite() {
        0.0
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}
