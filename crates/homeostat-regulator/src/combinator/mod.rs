//! RewardCombinator - aggregates a SignalSet into one bounded multiplier
//!
//! | Policy | Weights from | Aggregation |
//! |--------|--------------|-------------|
//! | `WeightedSum` | configuration | Σ w·s |
//! | `Fuzzy` | - | Mamdani min/max, centroid |
//! | `Adaptive` | [`AdaptiveWeightUpdater`] | Σ w·s |
//!
//! Every result is clamped into [`MultiplierBounds`]. The combinator owns the
//! signal history and records each sanitized input before returning.

mod fuzzy;
mod weighted;

use std::collections::HashMap;

use homeostat_common::{
    sanitize_unit, ConfigError, Degradation, DegradationReason, HomeostatError, MultiplierBounds,
    Result, SignalError, SignalName, SignalSet, WeightVector, NEUTRAL_MULTIPLIER,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adaptive::AdaptiveWeightUpdater;
use crate::history::SignalHistory;

pub use fuzzy::{FuzzyCondition, FuzzyRule, FuzzyRuleSet, FuzzyTerm, MembershipBreakpoints};
pub use weighted::weighted_sum;

/// Policy selector as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    WeightedSum,
    Fuzzy,
    Adaptive,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::WeightedSum => "weighted_sum",
            PolicyKind::Fuzzy => "fuzzy",
            PolicyKind::Adaptive => "adaptive",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a configured signal absent from the current step is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSignalPolicy {
    /// Substitute the neutral value 1.0
    #[default]
    Neutral,
    /// Drop the name and renormalize the remaining weights
    Omit,
    /// Neutral until absent for more than `stale_after_steps` steps, then omitted
    NeutralUntilStale,
}

/// Live combination strategy with its state
#[derive(Debug, Clone)]
pub enum CombinationPolicy {
    WeightedSum(WeightVector),
    Fuzzy(FuzzyRuleSet),
    Adaptive(AdaptiveWeightUpdater),
}

impl CombinationPolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            CombinationPolicy::WeightedSum(_) => PolicyKind::WeightedSum,
            CombinationPolicy::Fuzzy(_) => PolicyKind::Fuzzy,
            CombinationPolicy::Adaptive(_) => PolicyKind::Adaptive,
        }
    }

    /// Weights in use, `None` for the fuzzy policy
    pub fn weights(&self) -> Option<&WeightVector> {
        match self {
            CombinationPolicy::WeightedSum(weights) => Some(weights),
            CombinationPolicy::Fuzzy(_) => None,
            CombinationPolicy::Adaptive(updater) => Some(updater.weights()),
        }
    }
}

/// Multiplier plus the sanitization performed to get it
#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub multiplier: f64,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug, Clone)]
pub struct RewardCombinator {
    policy: CombinationPolicy,
    signals: Vec<SignalName>,
    bounds: MultiplierBounds,
    missing: MissingSignalPolicy,
    stale_after_steps: u32,
    missing_steps: HashMap<SignalName, u32>,
    history: SignalHistory,
}

impl RewardCombinator {
    /// Build a combinator over the configured signal names
    ///
    /// Weights must only name configured signals.
    pub fn new(
        policy: CombinationPolicy,
        signals: Vec<SignalName>,
        bounds: MultiplierBounds,
        history: SignalHistory,
    ) -> Result<Self> {
        bounds.validate()?;
        if signals.is_empty() {
            return Err(ConfigError::ZeroValue { field: "signals" }.into());
        }
        if let Some(weights) = policy.weights() {
            check_weight_names(weights, &signals)?;
        }
        Ok(Self {
            policy,
            signals,
            bounds,
            missing: MissingSignalPolicy::default(),
            stale_after_steps: 0,
            missing_steps: HashMap::new(),
            history,
        })
    }

    pub fn with_missing_policy(
        mut self,
        missing: MissingSignalPolicy,
        stale_after_steps: u32,
    ) -> Self {
        self.missing = missing;
        self.stale_after_steps = stale_after_steps;
        self
    }

    pub fn policy(&self) -> &CombinationPolicy {
        &self.policy
    }

    pub fn signals(&self) -> &[SignalName] {
        &self.signals
    }

    pub fn bounds(&self) -> &MultiplierBounds {
        &self.bounds
    }

    pub fn history(&self) -> &SignalHistory {
        &self.history
    }

    pub fn weights(&self) -> Option<&WeightVector> {
        self.policy.weights()
    }

    /// Combine this step's signals into a bounded multiplier
    ///
    /// An empty set yields exactly the neutral multiplier and touches no
    /// state. `Err` is returned only when the raw aggregate is not finite.
    pub fn compute(&mut self, signals: &SignalSet) -> Result<Combined> {
        if signals.is_empty() {
            return Ok(Combined {
                multiplier: NEUTRAL_MULTIPLIER,
                degradations: Vec::new(),
            });
        }

        let mut degradations = Vec::new();
        let mut present = SignalSet::new();
        for (name, value) in signals.iter() {
            match sanitize_unit(value) {
                Some(clean) => {
                    if clean != value {
                        debug!(signal = %name, value, clean, "Clamped signal into [0, 1]");
                    }
                    present.insert(name, clean);
                }
                None => {
                    warn!(signal = %name, value, "Non-finite signal treated as missing");
                    degradations.push(Degradation::signal(
                        name,
                        DegradationReason::Sanitized,
                        NEUTRAL_MULTIPLIER,
                    ));
                }
            }
        }

        for (name, value) in present.iter() {
            self.history.record(name, value);
        }

        let inputs = self.resolve_inputs(&present);
        if inputs.is_empty() {
            return Ok(Combined {
                multiplier: NEUTRAL_MULTIPLIER,
                degradations,
            });
        }

        let names: Vec<SignalName> = inputs.names().collect();
        let raw = match &self.policy {
            CombinationPolicy::WeightedSum(weights) => {
                weighted_sum(&weights.restricted_to(&names), &inputs)
            }
            CombinationPolicy::Adaptive(updater) => {
                weighted_sum(&updater.weights().restricted_to(&names), &inputs)
            }
            CombinationPolicy::Fuzzy(rules) => rules.infer(&inputs, &self.bounds),
        };

        if !raw.is_finite() {
            return Err(SignalError::NonFiniteMultiplier(raw).into());
        }

        let multiplier = self.bounds.clamp(raw);
        debug!(policy = %self.policy.kind(), raw, multiplier, "Signals combined");
        Ok(Combined {
            multiplier,
            degradations,
        })
    }

    /// Configured names with values for this step, after the missing policy
    fn resolve_inputs(&mut self, present: &SignalSet) -> SignalSet {
        let mut inputs = SignalSet::new();
        for &name in &self.signals {
            if let Some(value) = present.get(name) {
                self.missing_steps.insert(name, 0);
                inputs.insert(name, value);
                continue;
            }

            let absent = self.missing_steps.entry(name).or_insert(0);
            *absent = absent.saturating_add(1);
            let neutral = match self.missing {
                MissingSignalPolicy::Neutral => true,
                MissingSignalPolicy::Omit => false,
                MissingSignalPolicy::NeutralUntilStale => *absent <= self.stale_after_steps,
            };
            if neutral {
                inputs.insert(name, NEUTRAL_MULTIPLIER);
            }
        }
        inputs
    }

    /// Feed the step's task reward to the adaptive policy
    ///
    /// Returns the weights after the update, or `None` for non-adaptive
    /// policies.
    pub fn update_weights(
        &mut self,
        signals: &SignalSet,
        task_reward: f64,
    ) -> Option<&WeightVector> {
        match &mut self.policy {
            CombinationPolicy::Adaptive(updater) => {
                Some(updater.update(signals, task_reward, &self.history))
            }
            _ => None,
        }
    }

    /// Replace the live weights, e.g. when restoring persisted state
    pub fn restore_weights(&mut self, mut weights: WeightVector) -> Result<()> {
        check_weight_names(&weights, &self.signals)?;
        if !weights.is_normalized() {
            weights.renormalize_or_reset();
        }
        match &mut self.policy {
            CombinationPolicy::WeightedSum(current) => *current = weights,
            CombinationPolicy::Adaptive(updater) => updater.set_weights(weights),
            CombinationPolicy::Fuzzy(_) => {
                return Err(HomeostatError::Internal(
                    "fuzzy policy carries no weight vector".to_string(),
                ))
            }
        }
        Ok(())
    }
}

fn check_weight_names(
    weights: &WeightVector,
    signals: &[SignalName],
) -> std::result::Result<(), ConfigError> {
    if weights.is_empty() {
        return Err(ConfigError::MissingPolicyInput {
            policy: "weighted",
            requirement: "at least one weight",
        });
    }
    match weights.names().find(|name| !signals.contains(name)) {
        Some(unknown) => Err(ConfigError::UnknownSignalName {
            name: unknown.to_string(),
        }),
        None => Ok(()),
    }
}
