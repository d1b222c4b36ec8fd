//! MonitorSet - evaluates every configured monitor into one SignalSet

use std::collections::BTreeSet;
use std::sync::Arc;

use homeostat_common::{
    sanitize_unit, ConfigError, Degradation, DegradationReason, SignalName, SignalSet,
    DEFAULT_FALLBACK_SCORE,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::monitor::SignalMonitor;
use crate::monitors::*;
use crate::observables::{ModelState, Trajectory};

/// Which monitors run and how they are tuned
///
/// A monitor is enabled when its section is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub stability: Option<StabilityConfig>,
    pub diversity: Option<DiversityConfig>,
    pub plasticity: Option<PlasticityConfig>,
    pub attractor: Option<AttractorConfig>,
    pub external_feedback: Option<ExternalFeedbackConfig>,
    /// Value forwarded as `R_task` when the caller's task score is unusable
    pub task_fallback: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            stability: Some(StabilityConfig::default()),
            diversity: Some(DiversityConfig::default()),
            plasticity: Some(PlasticityConfig::default()),
            attractor: Some(AttractorConfig::default()),
            external_feedback: None,
            task_fallback: DEFAULT_FALLBACK_SCORE,
        }
    }
}

impl MonitorSettings {
    /// Reject non-finite or out-of-range tuning values
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fallback("task_fallback", self.task_fallback)?;

        if let Some(c) = &self.stability {
            check_finite("stability.threshold", c.threshold)?;
            check_positive("stability.sensitivity", c.sensitivity)?;
            check_fallback("stability.fallback", c.fallback)?;
            if let StabilityMeasure::SpectralRadius { iterations: 0 } = c.measure {
                return Err(ConfigError::ZeroValue {
                    field: "stability.measure.iterations",
                });
            }
        }
        if let Some(c) = &self.diversity {
            check_fallback("diversity.fallback", c.fallback)?;
        }
        if let Some(c) = &self.plasticity {
            check_positive("plasticity.healthy_magnitude", c.healthy_magnitude)?;
            check_positive("plasticity.band_width", c.band_width)?;
            check_fallback("plasticity.fallback", c.fallback)?;
        }
        if let Some(c) = &self.attractor {
            check_fallback("attractor.fallback", c.fallback)?;
        }
        if let Some(c) = &self.external_feedback {
            check_fallback("external_feedback.fallback", c.fallback)?;
        }
        Ok(())
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::ZeroValue { field })
    }
}

fn check_fallback(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_finite(field, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { field, value })
    }
}

/// Signals and recovered problems from one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorOutput {
    pub signals: SignalSet,
    pub degradations: Vec<Degradation>,
}

impl MonitorOutput {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    fn push(&mut self, reading: MonitorReading) {
        self.signals.insert(reading.signal, reading.value);
        if let Some(degradation) = reading.degradation {
            self.degradations.push(degradation);
        }
    }
}

/// Ordered collection of monitors, at most one per signal
#[derive(Debug, Clone)]
pub struct MonitorSet {
    monitors: Vec<SignalMonitor>,
    task_fallback: f64,
}

impl Default for MonitorSet {
    fn default() -> Self {
        Self {
            monitors: Vec::new(),
            task_fallback: DEFAULT_FALLBACK_SCORE,
        }
    }
}

impl MonitorSet {
    pub fn new(monitors: Vec<SignalMonitor>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for monitor in &monitors {
            if !seen.insert(monitor.signal()) {
                return Err(ConfigError::DuplicateSignal {
                    name: monitor.signal().to_string(),
                });
            }
        }
        Ok(Self {
            monitors,
            task_fallback: DEFAULT_FALLBACK_SCORE,
        })
    }

    /// Build the enabled monitors from settings
    pub fn from_settings(settings: &MonitorSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let mut monitors = Vec::new();
        if let Some(c) = &settings.stability {
            monitors.push(SignalMonitor::Stability(StabilityMonitor::new(c.clone())));
        }
        if let Some(c) = &settings.diversity {
            monitors.push(SignalMonitor::Diversity(DiversityMonitor::new(c.clone())));
        }
        if let Some(c) = &settings.plasticity {
            monitors.push(SignalMonitor::Plasticity(PlasticityMonitor::new(c.clone())));
        }
        if let Some(c) = &settings.attractor {
            monitors.push(SignalMonitor::Attractor(AttractorMonitor::new(c.clone())));
        }
        if let Some(c) = &settings.external_feedback {
            monitors.push(SignalMonitor::ExternalFeedback(ExternalFeedbackMonitor::new(
                c.clone(),
            )));
        }

        let mut set = Self::new(monitors)?;
        set.task_fallback = settings.task_fallback;
        Ok(set)
    }

    pub fn monitors(&self) -> &[SignalMonitor] {
        &self.monitors
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Whether this set can emit `name`; `R_task` is always forwarded
    pub fn produces(&self, name: SignalName) -> bool {
        name == SignalName::Task || self.monitors.iter().any(|m| m.signal() == name)
    }

    /// Every signal this set can emit
    pub fn signal_names(&self) -> Vec<SignalName> {
        std::iter::once(SignalName::Task)
            .chain(self.monitors.iter().map(|m| m.signal()))
            .collect()
    }

    /// Evaluate all monitors in order on the calling thread
    #[instrument(skip_all, fields(monitors = self.monitors.len()))]
    pub fn compute(&self, model: &ModelState, trajectory: &Trajectory) -> MonitorOutput {
        let mut output = MonitorOutput::default();
        self.forward_task_score(trajectory, &mut output);
        for monitor in &self.monitors {
            if let Some(reading) = monitor.compute(model, trajectory) {
                output.push(reading);
            }
        }
        debug!(
            signals = output.signals.len(),
            degraded = output.degradations.len(),
            "Monitors computed"
        );
        output
    }

    /// Evaluate monitors concurrently on the blocking pool and join the results
    ///
    /// Each monitor runs as its own task. A task that panics or is cancelled
    /// degrades to that monitor's fallback.
    #[instrument(skip_all, fields(monitors = self.monitors.len()))]
    pub async fn compute_concurrent(
        &self,
        model: Arc<ModelState>,
        trajectory: Arc<Trajectory>,
    ) -> MonitorOutput {
        let mut tasks = JoinSet::new();
        for (index, monitor) in self.monitors.iter().cloned().enumerate() {
            let model = Arc::clone(&model);
            let trajectory = Arc::clone(&trajectory);
            tasks.spawn_blocking(move || (index, monitor.compute(&model, &trajectory)));
        }

        let mut readings: Vec<Option<Option<MonitorReading>>> = vec![None; self.monitors.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, reading)) => readings[index] = Some(reading),
                Err(err) => warn!(error = %err, "Monitor task failed"),
            }
        }

        let mut output = MonitorOutput::default();
        self.forward_task_score(&trajectory, &mut output);
        for (monitor, reading) in self.monitors.iter().zip(readings) {
            match reading {
                Some(Some(reading)) => output.push(reading),
                Some(None) => {}
                None => output.push(MonitorReading::degraded(
                    monitor.signal(),
                    DegradationReason::MonitorFailed {
                        detail: "task did not complete".to_string(),
                    },
                    monitor.fallback(),
                )),
            }
        }
        output
    }

    fn forward_task_score(&self, trajectory: &Trajectory, output: &mut MonitorOutput) {
        let Some(score) = trajectory.task_score else {
            return;
        };
        let reading = match sanitize_unit(score) {
            Some(value) => MonitorReading::ok(SignalName::Task, value),
            None => MonitorReading::degraded(
                SignalName::Task,
                DegradationReason::NonFinite,
                self.task_fallback,
            ),
        };
        output.push(reading);
    }
}
