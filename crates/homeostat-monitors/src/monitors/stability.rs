//! Stability monitor: exp(-k × max(0, measure - threshold))
//!
//! The measure is either the global gradient L2 norm or the spectral radius
//! of a square recurrent/Jacobian matrix, estimated by power iteration.

use homeostat_common::{DegradationReason, SignalName, DEFAULT_FALLBACK_SCORE};
use serde::{Deserialize, Serialize};

use super::{all_finite, l2_norm, MonitorReading};
use crate::observables::ObservableKind;

/// Quantity the stability score is derived from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StabilityMeasure {
    /// Global L2 norm across all gradient tensors
    GradientNorm,
    /// Dominant eigenvalue magnitude of the recurrent matrix
    SpectralRadius { iterations: usize },
}

/// Stability monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    pub measure: StabilityMeasure,
    /// Measure tolerated without penalty
    pub threshold: f64,
    /// Decay rate k applied to the excess
    pub sensitivity: f64,
    /// Score used when the observable is unusable
    pub fallback: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            measure: StabilityMeasure::GradientNorm,
            threshold: 1.0,
            sensitivity: 1.0,
            fallback: DEFAULT_FALLBACK_SCORE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StabilityMonitor {
    config: StabilityConfig,
}

impl StabilityMonitor {
    pub fn new(config: StabilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    pub fn required(&self) -> ObservableKind {
        match self.config.measure {
            StabilityMeasure::GradientNorm => ObservableKind::Gradients,
            StabilityMeasure::SpectralRadius { .. } => ObservableKind::RecurrentMatrix,
        }
    }

    /// Map a raw measure to a score in (0, 1]
    pub fn score_measure(&self, measure: f64) -> f64 {
        let excess = (measure - self.config.threshold).max(0.0);
        (-self.config.sensitivity * excess).exp()
    }

    /// Score from gradient tensors; zero gradients score 1.0
    pub fn score_gradients(&self, tensors: &[Vec<f64>]) -> MonitorReading {
        if tensors.iter().all(|t| t.is_empty()) {
            return self.fallback(DegradationReason::Empty);
        }
        if !tensors.iter().all(|t| all_finite(t)) {
            return self.fallback(DegradationReason::NonFinite);
        }

        let squared: f64 = tensors
            .iter()
            .flat_map(|t| t.iter())
            .map(|v| v * v)
            .sum();
        let norm = squared.sqrt();
        if !norm.is_finite() {
            // Finite entries whose squares overflow
            return MonitorReading::ok(SignalName::Stability, 0.0);
        }
        MonitorReading::ok(SignalName::Stability, self.score_measure(norm))
    }

    /// Score from a square matrix's estimated spectral radius
    pub fn score_matrix(&self, matrix: &[Vec<f64>]) -> MonitorReading {
        let iterations = match self.config.measure {
            StabilityMeasure::SpectralRadius { iterations } => iterations.max(1),
            StabilityMeasure::GradientNorm => 50,
        };

        let n = matrix.len();
        if n == 0 {
            return self.fallback(DegradationReason::Empty);
        }
        if matrix.iter().any(|row| row.len() != n) {
            return self.fallback(DegradationReason::ShapeMismatch {
                detail: format!("expected {}x{} matrix", n, n),
            });
        }
        if !matrix.iter().all(|row| all_finite(row)) {
            return self.fallback(DegradationReason::NonFinite);
        }

        let radius = spectral_radius(matrix, iterations);
        if !radius.is_finite() {
            return MonitorReading::ok(SignalName::Stability, 0.0);
        }
        MonitorReading::ok(SignalName::Stability, self.score_measure(radius))
    }

    fn fallback(&self, reason: DegradationReason) -> MonitorReading {
        MonitorReading::degraded(SignalName::Stability, reason, self.config.fallback)
    }
}

/// Power-iteration estimate of the spectral radius
///
/// Averages the log growth over the second half of the iterations so that
/// complex dominant pairs (rotation) still converge to |λ|.
fn spectral_radius(matrix: &[Vec<f64>], iterations: usize) -> f64 {
    let n = matrix.len();
    let mut v = vec![1.0 / (n as f64).sqrt(); n];
    let mut log_growth = 0.0;
    let mut counted = 0usize;
    let burn_in = iterations / 2;

    for step in 0..iterations {
        let w: Vec<f64> = matrix
            .iter()
            .map(|row| row.iter().zip(&v).map(|(a, x)| a * x).sum())
            .collect();
        let norm = l2_norm(&w);
        if norm == 0.0 {
            return 0.0;
        }
        if step >= burn_in {
            log_growth += norm.ln();
            counted += 1;
        }
        v = w.into_iter().map(|x| x / norm).collect();
    }

    (log_growth / counted.max(1) as f64).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(threshold: f64, k: f64) -> StabilityMonitor {
        StabilityMonitor::new(StabilityConfig {
            threshold,
            sensitivity: k,
            ..Default::default()
        })
    }

    #[test]
    fn test_excess_norm_decay() {
        // norm 5.0 = 3-4-0 vector
        let reading = monitor(2.0, 1.0).score_gradients(&[vec![3.0, 4.0, 0.0]]);
        assert!(!reading.is_degraded());
        assert!((reading.value - (-3.0f64).exp()).abs() < 1e-12);
        assert!((reading.value - 0.0498).abs() < 1e-4);
    }

    #[test]
    fn test_zero_gradient_is_max_score() {
        let reading = monitor(2.0, 1.0).score_gradients(&[vec![0.0; 8], vec![0.0; 3]]);
        assert_eq!(reading.value, 1.0);
        assert!(!reading.is_degraded());
    }

    #[test]
    fn test_norm_spans_all_tensors() {
        let reading = monitor(0.0, 1.0).score_gradients(&[vec![3.0], vec![4.0]]);
        assert!((reading.value - (-5.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_gradient_falls_back() {
        let reading = monitor(2.0, 1.0).score_gradients(&[vec![1.0, f64::NAN]]);
        assert!(reading.is_degraded());
        assert_eq!(reading.value, DEFAULT_FALLBACK_SCORE);
    }

    #[test]
    fn test_empty_gradient_falls_back() {
        let reading = monitor(2.0, 1.0).score_gradients(&[]);
        assert!(reading.is_degraded());
    }

    #[test]
    fn test_spectral_radius_diagonal() {
        let radius = spectral_radius(&[vec![3.0, 0.0], vec![0.0, 1.0]], 60);
        assert!((radius - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_spectral_radius_rotation() {
        // 90 degree rotation scaled by 0.5: complex eigenvalues with |λ| = 0.5
        let radius = spectral_radius(&[vec![0.0, -0.5], vec![0.5, 0.0]], 40);
        assert!((radius - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_contracting_matrix_scores_max() {
        let monitor = StabilityMonitor::new(StabilityConfig {
            measure: StabilityMeasure::SpectralRadius { iterations: 40 },
            threshold: 1.0,
            ..Default::default()
        });
        let reading = monitor.score_matrix(&[vec![0.5, 0.0], vec![0.0, 0.2]]);
        assert_eq!(reading.value, 1.0);
        assert_eq!(monitor.required(), ObservableKind::RecurrentMatrix);
    }

    #[test]
    fn test_non_square_matrix_falls_back() {
        let reading = monitor(1.0, 1.0).score_matrix(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(
            reading.degradation.map(|d| d.reason),
            Some(DegradationReason::ShapeMismatch { .. })
        ));
    }
}
