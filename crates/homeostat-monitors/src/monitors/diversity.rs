//! Diversity monitor: normalized Shannon entropy H(p) / ln(n)
//!
//! Uniform distributions score 1.0. One-hot distributions, single-outcome
//! supports and zero-mass inputs score exactly 0.0.

use homeostat_common::{DegradationReason, SignalName, DEFAULT_FALLBACK_SCORE};
use serde::{Deserialize, Serialize};

use super::{all_finite, MonitorReading};

/// Diversity monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityConfig {
    /// Treat the input as logits and softmax it first
    pub from_logits: bool,
    /// Score used for non-finite or negative input
    pub fallback: f64,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            from_logits: false,
            fallback: DEFAULT_FALLBACK_SCORE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiversityMonitor {
    config: DiversityConfig,
}

impl DiversityMonitor {
    pub fn new(config: DiversityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiversityConfig {
        &self.config
    }

    pub fn score(&self, distribution: &[f64]) -> MonitorReading {
        if distribution.is_empty() {
            // Zero support carries no diversity
            return MonitorReading::degraded(SignalName::Diversity, DegradationReason::Empty, 0.0);
        }
        if !all_finite(distribution) {
            return self.fallback(DegradationReason::NonFinite);
        }

        let mut weights = if self.config.from_logits {
            softmax(distribution)
        } else {
            if distribution.iter().any(|p| *p < 0.0) {
                return self.fallback(DegradationReason::OutOfDomain {
                    detail: "negative probability mass".to_string(),
                });
            }
            distribution.to_vec()
        };

        let n = weights.len();
        if n == 1 {
            return MonitorReading::ok(SignalName::Diversity, 0.0);
        }

        // Scale by the largest mass so finite inputs cannot overflow the total
        let peak = weights.iter().fold(0.0f64, |acc, w| acc.max(*w));
        if peak > 0.0 {
            weights.iter_mut().for_each(|w| *w /= peak);
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return MonitorReading::degraded(
                SignalName::Diversity,
                DegradationReason::OutOfDomain {
                    detail: "zero total mass".to_string(),
                },
                0.0,
            );
        }

        let entropy: f64 = weights
            .iter()
            .filter(|w| **w > 0.0)
            .map(|w| {
                let p = w / total;
                -p * p.ln()
            })
            .sum();

        let score = entropy / (n as f64).ln();
        MonitorReading::ok(SignalName::Diversity, score)
    }

    fn fallback(&self, reason: DegradationReason) -> MonitorReading {
        MonitorReading::degraded(SignalName::Diversity, reason, self.config.fallback)
    }
}

/// Numerically stable softmax
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
