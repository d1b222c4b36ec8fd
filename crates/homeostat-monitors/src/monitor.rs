//! SignalMonitor - closed set of monitor variants behind one compute call

use homeostat_common::{DegradationReason, SignalName};

use crate::monitors::{
    AttractorMonitor, DiversityMonitor, ExternalFeedbackMonitor, MonitorReading,
    PlasticityMonitor, StabilityMonitor,
};
use crate::observables::{ModelState, ObservableKind, Trajectory};

/// A monitor turning one observable into one normalized signal
#[derive(Debug, Clone)]
pub enum SignalMonitor {
    Stability(StabilityMonitor),
    Diversity(DiversityMonitor),
    Plasticity(PlasticityMonitor),
    Attractor(AttractorMonitor),
    ExternalFeedback(ExternalFeedbackMonitor),
}

impl SignalMonitor {
    /// Signal this monitor emits
    pub fn signal(&self) -> SignalName {
        match self {
            SignalMonitor::Stability(_) => SignalName::Stability,
            SignalMonitor::Diversity(_) => SignalName::Diversity,
            SignalMonitor::Plasticity(_) => SignalName::Plasticity,
            SignalMonitor::Attractor(_) => SignalName::Attractor,
            SignalMonitor::ExternalFeedback(_) => SignalName::ExternalFeedback,
        }
    }

    /// Observable this monitor reads
    pub fn required(&self) -> ObservableKind {
        match self {
            SignalMonitor::Stability(m) => m.required(),
            SignalMonitor::Diversity(_) => ObservableKind::OutputDistribution,
            SignalMonitor::Plasticity(_) => ObservableKind::ParameterDeltas,
            SignalMonitor::Attractor(_) => ObservableKind::HiddenTrajectory,
            SignalMonitor::ExternalFeedback(_) => ObservableKind::ExternalFeedback,
        }
    }

    /// Value reported when the observable is unusable
    pub fn fallback(&self) -> f64 {
        match self {
            SignalMonitor::Stability(m) => m.config().fallback,
            SignalMonitor::Diversity(m) => m.config().fallback,
            SignalMonitor::Plasticity(m) => m.config().fallback,
            SignalMonitor::Attractor(m) => m.config().fallback,
            SignalMonitor::ExternalFeedback(m) => m.config().fallback,
        }
    }

    /// Whether a missing observable simply omits the signal
    ///
    /// External feedback is an optional channel; every other monitor reports
    /// a degraded fallback when its observable is absent.
    pub fn is_optional(&self) -> bool {
        matches!(self, SignalMonitor::ExternalFeedback(_))
    }

    /// Compute this step's reading
    ///
    /// Returns `None` only for an optional monitor whose observable is absent.
    pub fn compute(&self, model: &ModelState, trajectory: &Trajectory) -> Option<MonitorReading> {
        let reading = match (self, self.required()) {
            (SignalMonitor::Stability(m), ObservableKind::RecurrentMatrix) => {
                model.recurrent_matrix.as_deref().map(|matrix| m.score_matrix(matrix))
            }
            (SignalMonitor::Stability(m), _) => {
                model.gradients.as_deref().map(|tensors| m.score_gradients(tensors))
            }
            (SignalMonitor::Diversity(m), _) => {
                model.output_distribution.as_deref().map(|p| m.score(p))
            }
            (SignalMonitor::Plasticity(m), _) => {
                model.parameter_deltas.as_deref().map(|d| m.score(d))
            }
            (SignalMonitor::Attractor(m), _) => {
                trajectory.hidden_states.as_deref().map(|s| m.score(s))
            }
            (SignalMonitor::ExternalFeedback(m), _) => {
                trajectory.external_feedback.map(|f| m.score(f))
            }
        };

        match reading {
            Some(reading) => Some(reading),
            None if self.is_optional() => None,
            None => Some(MonitorReading::degraded(
                self.signal(),
                DegradationReason::MissingObservable,
                self.fallback(),
            )),
        }
    }
}
