//! External feedback monitor: clamped pass-through of a caller scalar

use homeostat_common::{sanitize_unit, DegradationReason, SignalName, DEFAULT_FALLBACK_SCORE};
use serde::{Deserialize, Serialize};

use super::MonitorReading;

/// External feedback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalFeedbackConfig {
    pub fallback: f64,
}

impl Default for ExternalFeedbackConfig {
    fn default() -> Self {
        Self {
            fallback: DEFAULT_FALLBACK_SCORE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternalFeedbackMonitor {
    config: ExternalFeedbackConfig,
}

impl ExternalFeedbackMonitor {
    pub fn new(config: ExternalFeedbackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExternalFeedbackConfig {
        &self.config
    }

    pub fn score(&self, feedback: f64) -> MonitorReading {
        match sanitize_unit(feedback) {
            Some(value) => MonitorReading::ok(SignalName::ExternalFeedback, value),
            None => MonitorReading::degraded(
                SignalName::ExternalFeedback,
                DegradationReason::NonFinite,
                self.config.fallback,
            ),
        }
    }
}
