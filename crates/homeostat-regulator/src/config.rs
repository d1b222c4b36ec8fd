//! Regulator configuration
//!
//! Values are layered: built-in defaults, then an optional file, then
//! `HOMEOSTAT__`-prefixed environment variables (nested with `__`, e.g.
//! `HOMEOSTAT__BOUNDS__MAX=3.0`). A `.env` file is read first if present.

use config::{Config, Environment, File};
use homeostat_common::{
    ConfigError, HomeostatError, MultiplierBounds, Result, SignalName, WeightVector,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_TREND_WINDOW,
};
use homeostat_monitors::MonitorSettings;
use serde::{Deserialize, Serialize};

use crate::adaptive::AdaptiveSettings;
use crate::combinator::{
    FuzzyRule, FuzzyRuleSet, MembershipBreakpoints, MissingSignalPolicy, PolicyKind,
};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "HOMEOSTAT";

/// Default centroid sampling resolution
pub const DEFAULT_FUZZY_RESOLUTION: usize = 201;

/// One configured signal weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWeight {
    pub signal: SignalName,
    pub weight: f64,
}

/// Fuzzy policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzySettings {
    /// Input partition on [0, 1]
    pub breakpoints: MembershipBreakpoints,
    /// Rule table; the stock table when unset
    pub rules: Option<Vec<FuzzyRule>>,
    /// Samples used for centroid defuzzification
    pub resolution: usize,
}

impl Default for FuzzySettings {
    fn default() -> Self {
        Self {
            breakpoints: MembershipBreakpoints::default(),
            rules: None,
            resolution: DEFAULT_FUZZY_RESOLUTION,
        }
    }
}

impl FuzzySettings {
    /// Build the validated rule set over `signals`
    pub fn rule_set(
        &self,
        signals: &[SignalName],
    ) -> std::result::Result<FuzzyRuleSet, ConfigError> {
        let rules = match &self.rules {
            Some(rules) => rules.clone(),
            None => FuzzyRuleSet::default_rules()
                .into_iter()
                .filter(|rule| rule.when.iter().all(|c| signals.contains(&c.signal)))
                .collect(),
        };
        FuzzyRuleSet::new(rules, self.breakpoints, self.resolution, signals)
    }
}

/// Complete regulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatorConfig {
    /// Combination policy
    pub policy: PolicyKind,
    /// Signal names taking part in combination
    pub signals: Vec<SignalName>,
    /// Initial weights; uniform over `signals` when unset
    pub weights: Option<Vec<SignalWeight>>,
    pub fuzzy: FuzzySettings,
    pub bounds: MultiplierBounds,
    /// Values kept per signal
    pub history_capacity: usize,
    /// Entries used for trend estimation
    pub trend_window: usize,
    pub missing_signal: MissingSignalPolicy,
    /// Consecutive absent steps before a signal is omitted (`neutral_until_stale`)
    pub stale_after_steps: u32,
    pub adaptive: AdaptiveSettings,
    pub monitors: MonitorSettings,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            signals: vec![
                SignalName::Task,
                SignalName::Stability,
                SignalName::Diversity,
                SignalName::Plasticity,
                SignalName::Attractor,
            ],
            weights: None,
            fuzzy: FuzzySettings::default(),
            bounds: MultiplierBounds::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            trend_window: DEFAULT_TREND_WINDOW,
            missing_signal: MissingSignalPolicy::default(),
            stale_after_steps: 10,
            adaptive: AdaptiveSettings::default(),
            monitors: MonitorSettings::default(),
        }
    }
}

impl RegulatorConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fail fast on anything that would make regulation ill-defined
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.signals.is_empty() {
            return Err(ConfigError::ZeroValue { field: "signals" });
        }
        for (i, name) in self.signals.iter().enumerate() {
            if self.signals[..i].contains(name) {
                return Err(ConfigError::DuplicateSignal {
                    name: name.to_string(),
                });
            }
        }

        self.bounds.validate()?;
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroValue {
                field: "history_capacity",
            });
        }
        if self.trend_window < 2 {
            return Err(ConfigError::ZeroValue {
                field: "trend_window",
            });
        }

        self.initial_weights()?;
        self.adaptive.validate()?;
        self.monitors.validate()?;

        if self.policy == PolicyKind::Fuzzy {
            self.fuzzy.rule_set(&self.signals)?;
        }
        Ok(())
    }

    /// Initial weight vector for the weighted and adaptive policies
    pub fn initial_weights(&self) -> std::result::Result<WeightVector, ConfigError> {
        let Some(weights) = &self.weights else {
            return Ok(WeightVector::uniform(&self.signals));
        };

        for entry in weights {
            if !self.signals.contains(&entry.signal) {
                return Err(ConfigError::UnknownSignalName {
                    name: entry.signal.to_string(),
                });
            }
        }

        WeightVector::new(weights.iter().map(|w| (w.signal, w.weight))).map_err(|err| {
            match err {
                HomeostatError::Config(inner) => inner,
                _ => ConfigError::MissingPolicyInput {
                    policy: "weighted",
                    requirement: "weights with a positive sum",
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = RegulatorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.policy, PolicyKind::WeightedSum);
        assert!(cfg.initial_weights().unwrap().is_normalized());
    }

    #[test]
    fn test_unknown_weight_name_fails_fast() {
        let cfg = RegulatorConfig {
            signals: vec![SignalName::Task, SignalName::Stability],
            weights: Some(vec![SignalWeight {
                signal: SignalName::Diversity,
                weight: 1.0,
            }]),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnknownSignalName { .. })
        ));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let cfg = RegulatorConfig {
            weights: Some(vec![SignalWeight {
                signal: SignalName::Task,
                weight: 0.0,
            }]),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let cfg = RegulatorConfig {
            weights: Some(vec![SignalWeight {
                signal: SignalName::Task,
                weight: -0.5,
            }]),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidWeight { .. })));
    }

    #[test]
    fn test_bad_bounds_rejected() {
        let cfg = RegulatorConfig {
            bounds: MultiplierBounds { min: 2.0, max: 1.0 },
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidBounds { .. })));
    }

    #[test]
    fn test_duplicate_signal_rejected() {
        let cfg = RegulatorConfig {
            signals: vec![SignalName::Task, SignalName::Task],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateSignal { .. })));
    }

    #[test]
    fn test_default_fuzzy_rules_follow_signals() {
        let fuzzy = FuzzySettings::default();
        let set = fuzzy
            .rule_set(&[SignalName::Task, SignalName::Stability])
            .unwrap();
        assert!(set
            .rules()
            .iter()
            .all(|r| r.when.iter().all(|c| c.signal != SignalName::Diversity)));
    }

    #[test]
    fn test_custom_fuzzy_rule_with_unknown_signal() {
        let cfg = RegulatorConfig {
            policy: PolicyKind::Fuzzy,
            signals: vec![SignalName::Task],
            fuzzy: FuzzySettings {
                rules: Some(FuzzyRuleSet::default_rules()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnknownSignalName { .. })
        ));
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{
            "policy": "adaptive",
            "signals": ["R_task", "R_stab"],
            "weights": [{"signal": "R_task", "weight": 3.0}, {"signal": "R_stab", "weight": 1.0}],
            "missing_signal": "omit"
        }"#;
        let cfg: RegulatorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.policy, PolicyKind::Adaptive);
        assert_eq!(cfg.missing_signal, MissingSignalPolicy::Omit);
        let weights = cfg.initial_weights().unwrap();
        assert!((weights.get(SignalName::Task) - 0.75).abs() < 1e-12);
        assert_eq!(cfg.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let cfg = RegulatorConfig::load(None).unwrap();
        assert_eq!(cfg.signals.len(), RegulatorConfig::default().signals.len());
    }
}
