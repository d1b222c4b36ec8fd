//! CyberneticEngine - monitors and combinator behind one per-step call
//!
//! ```text
//! step(model, trajectory)
//!   -> MonitorSet::compute        (signals + degradations)
//!   -> RewardCombinator::compute  (bounded multiplier, history recorded)
//!   -> RegulationOutcome
//! observe_task_reward(r)
//!   -> AdaptiveWeightUpdater::update (adaptive policy only)
//! ```
//!
//! The engine never returns an error once constructed. A failed combination
//! yields the last-known-good multiplier with a step-level degradation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use homeostat_common::{
    ConfigError, Degradation, DegradationReason, MultiplierBounds, RegulationOutcome, Result,
    SignalSet, WeightVector, NEUTRAL_MULTIPLIER,
};
use homeostat_monitors::{ModelState, MonitorOutput, MonitorSet, Trajectory};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adaptive::AdaptiveWeightUpdater;
use crate::combinator::{CombinationPolicy, PolicyKind, RewardCombinator};
use crate::config::RegulatorConfig;
use crate::history::SignalHistory;
use crate::telemetry::RegulatorTelemetry;

/// Engine handle that can cross threads
pub type SharedEngine = Arc<Mutex<CyberneticEngine>>;

/// Persistable copy of an engine's weight vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub engine_id: Uuid,
    pub policy: PolicyKind,
    pub step: u64,
    pub saved_at: DateTime<Utc>,
    pub weights: WeightVector,
}

impl WeightSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub struct CyberneticEngine {
    id: Uuid,
    monitors: MonitorSet,
    combinator: RewardCombinator,
    last_good: f64,
    step: u64,
    last_signals: SignalSet,
    telemetry: Option<Arc<RegulatorTelemetry>>,
}

impl std::fmt::Debug for CyberneticEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyberneticEngine")
            .field("id", &self.id)
            .field("policy", &self.combinator.policy().kind())
            .field("step", &self.step)
            .field("last_good", &self.last_good)
            .finish()
    }
}

impl CyberneticEngine {
    /// Validate the configuration and build monitors and combinator
    pub fn new(config: RegulatorConfig) -> Result<Self> {
        config.validate()?;

        let monitors = MonitorSet::from_settings(&config.monitors)?;
        if let Some(name) = config
            .signals
            .iter()
            .find(|name| !monitors.produces(**name))
        {
            return Err(ConfigError::UnproducedSignal {
                name: name.to_string(),
            }
            .into());
        }

        let policy = match config.policy {
            PolicyKind::WeightedSum => CombinationPolicy::WeightedSum(config.initial_weights()?),
            PolicyKind::Fuzzy => CombinationPolicy::Fuzzy(config.fuzzy.rule_set(&config.signals)?),
            PolicyKind::Adaptive => CombinationPolicy::Adaptive(AdaptiveWeightUpdater::new(
                config.initial_weights()?,
                config.adaptive.clone(),
                config.history_capacity,
            )),
        };

        let history = SignalHistory::new(config.history_capacity, config.trend_window);
        let combinator =
            RewardCombinator::new(policy, config.signals.clone(), config.bounds, history)?
                .with_missing_policy(config.missing_signal, config.stale_after_steps);

        let id = Uuid::now_v7();
        info!(
            engine_id = %id,
            policy = %config.policy,
            signals = ?config.signals,
            monitors = monitors.len(),
            "Cybernetic engine created"
        );

        Ok(Self {
            id,
            monitors,
            combinator,
            last_good: NEUTRAL_MULTIPLIER,
            step: 0,
            last_signals: SignalSet::new(),
            telemetry: None,
        })
    }

    pub fn with_telemetry(mut self, telemetry: Arc<RegulatorTelemetry>) -> Self {
        if let Some(weights) = self.combinator.weights() {
            telemetry.observe_weights(weights);
        }
        self.telemetry = Some(telemetry);
        self
    }

    /// Wrap in a thread-safe handle
    pub fn shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Steps regulated so far
    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn last_multiplier(&self) -> f64 {
        self.last_good
    }

    pub fn last_signals(&self) -> &SignalSet {
        &self.last_signals
    }

    pub fn bounds(&self) -> &MultiplierBounds {
        self.combinator.bounds()
    }

    pub fn monitors(&self) -> &MonitorSet {
        &self.monitors
    }

    pub fn combinator(&self) -> &RewardCombinator {
        &self.combinator
    }

    pub fn history(&self) -> &SignalHistory {
        self.combinator.history()
    }

    pub fn weights(&self) -> Option<&WeightVector> {
        self.combinator.weights()
    }

    /// Run every monitor and combine the resulting signals
    #[instrument(skip_all, fields(engine_id = %self.id, step = self.step + 1))]
    pub fn step(&mut self, model: &ModelState, trajectory: &Trajectory) -> RegulationOutcome {
        let output = self.monitors.compute(model, trajectory);
        self.regulate(output)
    }

    /// Like [`CyberneticEngine::step`] with monitors on tokio's blocking pool
    #[instrument(skip_all, fields(engine_id = %self.id, step = self.step + 1))]
    pub async fn step_concurrent(
        &mut self,
        model: Arc<ModelState>,
        trajectory: Arc<Trajectory>,
    ) -> RegulationOutcome {
        let output = self.monitors.compute_concurrent(model, trajectory).await;
        self.regulate(output)
    }

    /// Combine caller-supplied signals, bypassing the monitors
    pub fn compute(&mut self, signals: &SignalSet) -> RegulationOutcome {
        self.regulate(MonitorOutput {
            signals: signals.clone(),
            degradations: Vec::new(),
        })
    }

    fn regulate(&mut self, output: MonitorOutput) -> RegulationOutcome {
        let MonitorOutput {
            signals,
            mut degradations,
        } = output;
        self.step += 1;

        let multiplier = match self.combinator.compute(&signals) {
            Ok(combined) => {
                degradations.extend(combined.degradations);
                self.last_good = combined.multiplier;
                combined.multiplier
            }
            Err(err) => {
                warn!(
                    engine_id = %self.id,
                    error = %err,
                    fallback = self.last_good,
                    "Combination failed, using last-known-good multiplier"
                );
                degradations.push(Degradation::step(
                    DegradationReason::CombinatorFailed {
                        detail: err.to_string(),
                    },
                    self.last_good,
                ));
                self.last_good
            }
        };

        let outcome = RegulationOutcome::new(multiplier, degradations, self.step);
        if let Some(telemetry) = &self.telemetry {
            telemetry.observe_step(&signals, &outcome);
        }
        debug!(
            step = self.step,
            multiplier,
            degraded = outcome.degraded,
            "Step regulated"
        );
        self.last_signals = signals;
        outcome
    }

    /// Feed this step's task reward to the adaptive policy
    ///
    /// Call once per step, after the step was regulated. Returns the updated
    /// weights for the adaptive policy and `None` otherwise.
    pub fn observe_task_reward(&mut self, task_reward: f64) -> Option<WeightVector> {
        let resets_before = self.adaptive_resets();
        let weights = self
            .combinator
            .update_weights(&self.last_signals, task_reward)?
            .clone();

        if let Some(telemetry) = &self.telemetry {
            for _ in resets_before..self.adaptive_resets() {
                telemetry.record_weight_reset();
            }
            telemetry.observe_weights(&weights);
        }
        Some(weights)
    }

    fn adaptive_resets(&self) -> u64 {
        match self.combinator.policy() {
            CombinationPolicy::Adaptive(updater) => updater.resets(),
            _ => 0,
        }
    }

    /// Copy of the current weights, `None` for the fuzzy policy
    pub fn snapshot(&self) -> Option<WeightSnapshot> {
        let weights = self.combinator.weights()?.clone();
        Some(WeightSnapshot {
            engine_id: self.id,
            policy: self.combinator.policy().kind(),
            step: self.step,
            saved_at: Utc::now(),
            weights,
        })
    }

    /// Re-inject persisted weights
    pub fn restore(&mut self, snapshot: WeightSnapshot) -> Result<()> {
        self.replace_weights(snapshot.weights)?;
        info!(
            engine_id = %self.id,
            from_engine = %snapshot.engine_id,
            from_step = snapshot.step,
            "Weights restored from snapshot"
        );
        Ok(())
    }

    /// Overwrite the live weights
    pub fn replace_weights(&mut self, weights: WeightVector) -> Result<()> {
        self.combinator.restore_weights(weights)?;
        if let (Some(telemetry), Some(weights)) = (&self.telemetry, self.combinator.weights()) {
            telemetry.observe_weights(weights);
        }
        Ok(())
    }
}
