//! Prometheus metrics for the regulator
//!
//! One `RegulatorTelemetry` may be shared by every engine of a registry; the
//! caller decides which `prometheus::Registry` it is exported from.

use homeostat_common::{RegulationOutcome, SignalSet, WeightVector};
use prometheus::{Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Prometheus metrics for reward regulation
pub struct RegulatorTelemetry {
    pub multiplier: Gauge,
    pub multiplier_distribution: Histogram,
    pub steps_total: IntCounter,
    pub degraded_steps_total: IntCounter,
    pub weight_resets_total: IntCounter,
    pub signal_value: GaugeVec,
    pub signal_weight: GaugeVec,
}

impl RegulatorTelemetry {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            multiplier: Gauge::new(
                "homeostat_multiplier",
                "Most recent reward multiplier",
            )?,
            multiplier_distribution: Histogram::with_opts(
                HistogramOpts::new(
                    "homeostat_multiplier_distribution",
                    "Distribution of reward multipliers",
                )
                .buckets(vec![0.1, 0.25, 0.5, 0.75, 0.9, 1.0, 1.1, 1.25, 1.5, 2.0, 3.0]),
            )?,
            steps_total: IntCounter::new(
                "homeostat_steps_total",
                "Total regulation steps",
            )?,
            degraded_steps_total: IntCounter::new(
                "homeostat_degraded_steps_total",
                "Regulation steps that used a fallback",
            )?,
            weight_resets_total: IntCounter::new(
                "homeostat_weight_resets_total",
                "Weight vectors reset to uniform after collapsing",
            )?,
            signal_value: GaugeVec::new(
                Opts::new("homeostat_signal_value", "Most recent signal value"),
                &["signal"],
            )?,
            signal_weight: GaugeVec::new(
                Opts::new("homeostat_signal_weight", "Current combination weight"),
                &["signal"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.multiplier.clone()))?;
        registry.register(Box::new(self.multiplier_distribution.clone()))?;
        registry.register(Box::new(self.steps_total.clone()))?;
        registry.register(Box::new(self.degraded_steps_total.clone()))?;
        registry.register(Box::new(self.weight_resets_total.clone()))?;
        registry.register(Box::new(self.signal_value.clone()))?;
        registry.register(Box::new(self.signal_weight.clone()))?;
        Ok(())
    }

    /// Record one regulated step
    pub fn observe_step(&self, signals: &SignalSet, outcome: &RegulationOutcome) {
        self.steps_total.inc();
        if outcome.degraded {
            self.degraded_steps_total.inc();
        }
        self.multiplier.set(outcome.multiplier);
        self.multiplier_distribution.observe(outcome.multiplier);
        for (name, value) in signals.iter() {
            self.signal_value.with_label_values(&[name.as_str()]).set(value);
        }
    }

    pub fn observe_weights(&self, weights: &WeightVector) {
        for (name, weight) in weights.iter() {
            self.signal_weight.with_label_values(&[name.as_str()]).set(weight);
        }
    }

    pub fn record_weight_reset(&self) {
        self.weight_resets_total.inc();
    }
}
