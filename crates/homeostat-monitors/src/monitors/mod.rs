//! Monitor variants and the reading they produce

pub mod attractor;
pub mod diversity;
pub mod external;
pub mod plasticity;
pub mod stability;

use homeostat_common::{Degradation, DegradationReason, SignalName, DEFAULT_FALLBACK_SCORE};
use tracing::warn;

pub use self::attractor::{AttractorConfig, AttractorMonitor};
pub use self::diversity::{DiversityConfig, DiversityMonitor};
pub use self::external::{ExternalFeedbackConfig, ExternalFeedbackMonitor};
pub use self::plasticity::{PlasticityConfig, PlasticityMonitor};
pub use self::stability::{StabilityConfig, StabilityMeasure, StabilityMonitor};

/// One monitor's output for one step
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReading {
    pub signal: SignalName,
    /// Score in [0, 1]
    pub value: f64,
    /// Set when the value is a fallback
    pub degradation: Option<Degradation>,
}

impl MonitorReading {
    /// Healthy reading clamped into [0, 1]
    ///
    /// A non-finite score is never passed through; it becomes a degraded
    /// reading at the default fallback.
    pub fn ok(signal: SignalName, value: f64) -> Self {
        if !value.is_finite() {
            return Self::degraded(signal, DegradationReason::NonFinite, DEFAULT_FALLBACK_SCORE);
        }
        Self {
            signal,
            value: value.clamp(0.0, 1.0),
            degradation: None,
        }
    }

    /// Fallback reading; logged so degraded steps are never silent
    pub fn degraded(signal: SignalName, reason: DegradationReason, fallback: f64) -> Self {
        warn!(signal = %signal, reason = %reason, fallback, "Monitor degraded");
        Self {
            signal,
            value: fallback,
            degradation: Some(Degradation::signal(signal, reason, fallback)),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}

/// L2 norm of a vector
#[inline]
pub(crate) fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[inline]
pub(crate) fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}
