//! Plasticity monitor: banded score around a healthy update magnitude
//!
//! ```text
//! m     = rms(deltas)
//! score = exp(-(ln(m / healthy))² / (2 · width²))
//! ```
//!
//! Frozen parameters (m = 0) and runaway updates both score toward 0.0.

use homeostat_common::{DegradationReason, SignalName, DEFAULT_FALLBACK_SCORE};
use serde::{Deserialize, Serialize};

use super::{all_finite, MonitorReading};

/// Plasticity monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlasticityConfig {
    /// RMS update magnitude that scores 1.0
    pub healthy_magnitude: f64,
    /// Band width in natural-log units of magnitude
    pub band_width: f64,
    pub fallback: f64,
}

impl Default for PlasticityConfig {
    fn default() -> Self {
        Self {
            healthy_magnitude: 1e-3,
            band_width: 1.0,
            fallback: DEFAULT_FALLBACK_SCORE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlasticityMonitor {
    config: PlasticityConfig,
}

impl PlasticityMonitor {
    pub fn new(config: PlasticityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlasticityConfig {
        &self.config
    }

    pub fn score(&self, deltas: &[f64]) -> MonitorReading {
        if deltas.is_empty() {
            return self.fallback(DegradationReason::Empty);
        }
        if !all_finite(deltas) {
            return self.fallback(DegradationReason::NonFinite);
        }

        let mean_square = deltas.iter().map(|d| d * d).sum::<f64>() / deltas.len() as f64;
        let magnitude = mean_square.sqrt();
        if magnitude == 0.0 {
            return MonitorReading::ok(SignalName::Plasticity, 0.0);
        }
        if !magnitude.is_finite() {
            return MonitorReading::ok(SignalName::Plasticity, 0.0);
        }

        MonitorReading::ok(SignalName::Plasticity, self.score_magnitude(magnitude))
    }

    /// Band score for an already-computed magnitude
    pub fn score_magnitude(&self, magnitude: f64) -> f64 {
        let z = (magnitude / self.config.healthy_magnitude).ln();
        let width = self.config.band_width;
        (-(z * z) / (2.0 * width * width)).exp()
    }

    fn fallback(&self, reason: DegradationReason) -> MonitorReading {
        MonitorReading::degraded(SignalName::Plasticity, reason, self.config.fallback)
    }
}
