//! Multiplier bounds and per-step regulation outcomes

use serde::{Deserialize, Serialize};

use super::signal::SignalName;
use crate::error::ConfigError;
use crate::{DEFAULT_MULTIPLIER_MAX, DEFAULT_MULTIPLIER_MIN, NEUTRAL_MULTIPLIER};

/// Clamp range for the reward multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierBounds {
    /// Lowest multiplier ever returned
    pub min: f64,
    /// Highest multiplier ever returned
    pub max: f64,
}

impl Default for MultiplierBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_MULTIPLIER_MIN,
            max: DEFAULT_MULTIPLIER_MAX,
        }
    }
}

impl MultiplierBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Bounds must be finite, non-negative, ordered
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.min.is_finite()
            && self.max.is_finite()
            && self.min >= 0.0
            && self.min < self.max;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidBounds {
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Clamp into range; a non-finite input maps to the clamped neutral value
    #[inline]
    pub fn clamp(&self, raw: f64) -> f64 {
        let value = if raw.is_finite() { raw } else { NEUTRAL_MULTIPLIER };
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Width of the range
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Why a signal or step was degraded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DegradationReason {
    /// Observable contained NaN or infinity
    NonFinite,
    /// Observable was empty
    Empty,
    /// Required observable was not supplied for this step
    MissingObservable,
    /// Observable had the wrong shape (ragged rows, non-square matrix)
    ShapeMismatch { detail: String },
    /// Observable contained values outside its domain (e.g. negative mass)
    OutOfDomain { detail: String },
    /// Signal value reached the combinator outside [0, 1] or non-finite
    Sanitized,
    /// The monitor task did not complete
    MonitorFailed { detail: String },
    /// The combinator failed; the last-known-good multiplier was used
    CombinatorFailed { detail: String },
}

impl std::fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradationReason::NonFinite => write!(f, "non-finite input"),
            DegradationReason::Empty => write!(f, "empty input"),
            DegradationReason::MissingObservable => write!(f, "observable not supplied"),
            DegradationReason::ShapeMismatch { detail } => write!(f, "shape mismatch: {}", detail),
            DegradationReason::OutOfDomain { detail } => write!(f, "out of domain: {}", detail),
            DegradationReason::Sanitized => write!(f, "value sanitized"),
            DegradationReason::MonitorFailed { detail } => write!(f, "monitor failed: {}", detail),
            DegradationReason::CombinatorFailed { detail } => {
                write!(f, "combinator failed: {}", detail)
            }
        }
    }
}

/// A recovered problem, reported instead of propagated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    /// Affected signal, `None` for step-level failures
    pub signal: Option<SignalName>,
    pub reason: DegradationReason,
    /// Value that was used in place of the bad one
    pub fallback: f64,
}

impl Degradation {
    pub fn signal(signal: SignalName, reason: DegradationReason, fallback: f64) -> Self {
        Self {
            signal: Some(signal),
            reason,
            fallback,
        }
    }

    pub fn step(reason: DegradationReason, fallback: f64) -> Self {
        Self {
            signal: None,
            reason,
            fallback,
        }
    }
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.signal {
            Some(name) => write!(f, "{}: {} (fallback {:.4})", name, self.reason, self.fallback),
            None => write!(f, "step: {} (fallback {:.4})", self.reason, self.fallback),
        }
    }
}

/// Result of regulating one training step
///
/// The multiplier is always finite and within the configured bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationOutcome {
    /// Factor the caller multiplies into the task reward
    pub multiplier: f64,
    /// True if any part of the step used a fallback
    pub degraded: bool,
    /// What was recovered this step
    pub degradations: Vec<Degradation>,
    /// Engine step counter after this call
    pub step: u64,
}

impl RegulationOutcome {
    pub fn new(multiplier: f64, degradations: Vec<Degradation>, step: u64) -> Self {
        Self {
            multiplier,
            degraded: !degradations.is_empty(),
            degradations,
            step,
        }
    }

    /// Apply the multiplier to an environment reward
    #[inline]
    pub fn regulate(&self, reward_env: f64) -> f64 {
        reward_env * self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let bounds = MultiplierBounds::default();
        assert_eq!(bounds.min, 0.1);
        assert_eq!(bounds.max, 2.0);
        assert!(bounds.validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(MultiplierBounds::new(2.0, 0.1).is_err());
        assert!(MultiplierBounds::new(f64::NAN, 1.0).is_err());
        assert!(MultiplierBounds::new(-1.0, 1.0).is_err());
    }

    #[test]
    fn test_clamp_sanitizes() {
        let bounds = MultiplierBounds::default();
        assert_eq!(bounds.clamp(0.01), 0.1);
        assert_eq!(bounds.clamp(5.0), 2.0);
        assert_eq!(bounds.clamp(f64::NAN), 1.0);
        assert_eq!(bounds.clamp(f64::NEG_INFINITY), 1.0);
    }

    #[test]
    fn test_outcome_degraded_flag() {
        let clean = RegulationOutcome::new(0.8, Vec::new(), 1);
        assert!(!clean.degraded);
        assert!((clean.regulate(10.0) - 8.0).abs() < 1e-12);

        let degraded = RegulationOutcome::new(
            1.0,
            vec![Degradation::signal(
                SignalName::Diversity,
                DegradationReason::Empty,
                0.5,
            )],
            2,
        );
        assert!(degraded.degraded);
        assert!(degraded.degradations[0].to_string().contains("R_div"));
    }
}
