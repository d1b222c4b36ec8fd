//! Attractor monitor: contraction of a hidden-state trajectory
//!
//! With successive distances `d_t = ‖s_{t+1} - s_t‖` the contraction rate is
//! the geometric mean of `d_{t+1} / d_t`. Score is `1 - rate`, clamped, so a
//! fast collapse onto a fixed point scores near 1.0 while divergence and
//! sustained oscillation score 0.0.

use homeostat_common::{DegradationReason, SignalName, DEFAULT_FALLBACK_SCORE};
use serde::{Deserialize, Serialize};

use super::{all_finite, MonitorReading};

/// Minimum number of states needed for one distance ratio
const MIN_STATES: usize = 3;

/// Attractor monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttractorConfig {
    /// Only the last `window` states are inspected (0 = all)
    pub window: usize,
    pub fallback: f64,
}

impl Default for AttractorConfig {
    fn default() -> Self {
        Self {
            window: 0,
            fallback: DEFAULT_FALLBACK_SCORE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttractorMonitor {
    config: AttractorConfig,
}

impl AttractorMonitor {
    pub fn new(config: AttractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AttractorConfig {
        &self.config
    }

    pub fn score(&self, states: &[Vec<f64>]) -> MonitorReading {
        let states = if self.config.window > 0 && states.len() > self.config.window {
            &states[states.len() - self.config.window..]
        } else {
            states
        };

        if states.is_empty() {
            return self.fallback(DegradationReason::Empty);
        }
        if states.len() < MIN_STATES {
            return self.fallback(DegradationReason::ShapeMismatch {
                detail: format!("need at least {} states, got {}", MIN_STATES, states.len()),
            });
        }
        let dim = states[0].len();
        if dim == 0 || states.iter().any(|s| s.len() != dim) {
            return self.fallback(DegradationReason::ShapeMismatch {
                detail: "hidden states must share one non-zero dimension".to_string(),
            });
        }
        if !states.iter().all(|s| all_finite(s)) {
            return self.fallback(DegradationReason::NonFinite);
        }

        // Ratios are scale free; rescaling keeps huge states from overflowing
        let scale = states
            .iter()
            .flat_map(|s| s.iter())
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let distances: Vec<f64> = states
            .windows(2)
            .map(|pair| {
                pair[0]
                    .iter()
                    .zip(&pair[1])
                    .map(|(a, b)| {
                        let d = b / scale - a / scale;
                        d * d
                    })
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();

        let mut log_ratio_sum = 0.0;
        let mut ratios = 0usize;
        for pair in distances.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            match (prev > 0.0, next > 0.0) {
                // Resting on a fixed point
                (false, false) => continue,
                // Knocked off a fixed point
                (false, true) => return MonitorReading::ok(SignalName::Attractor, 0.0),
                // Landed exactly on a fixed point
                (true, false) => log_ratio_sum += f64::MIN_POSITIVE.ln(),
                (true, true) => log_ratio_sum += (next / prev).ln(),
            }
            ratios += 1;
        }

        if ratios == 0 {
            return MonitorReading::ok(SignalName::Attractor, 1.0);
        }

        let rate = (log_ratio_sum / ratios as f64).exp();
        if !rate.is_finite() {
            return MonitorReading::ok(SignalName::Attractor, 0.0);
        }
        MonitorReading::ok(SignalName::Attractor, 1.0 - rate)
    }

    fn fallback(&self, reason: DegradationReason) -> MonitorReading {
        MonitorReading::degraded(SignalName::Attractor, reason, self.config.fallback)
    }
}
