//! Fuzzy-rule combination (Mamdani min/max inference)
//!
//! ```text
//! activation(rule) = weight × min(μ_term(signal) for each condition)
//! μ_out(x)         = max(min(activation, μ_then(x)) for each rule)
//! multiplier       = Σ x·μ_out(x) / Σ μ_out(x)     (centroid)
//! ```
//!
//! Input terms partition [0, 1] with three breakpoints. Output terms live on
//! the multiplier range: `Low` peaks at `min`, `Medium` at the neutral point
//! (1.0 when inside the range), `High` at `max`.

use std::collections::BTreeSet;

use homeostat_common::{ConfigError, MultiplierBounds, SignalName, SignalSet, NEUTRAL_MULTIPLIER};
use serde::{Deserialize, Serialize};

/// Linguistic term shared by inputs and the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyTerm {
    Low,
    Medium,
    High,
}

/// Breakpoints of the input partition on [0, 1]
///
/// `Low` is full below `low` and gone at `mid`; `Medium` peaks at `mid`;
/// `High` starts at `mid` and is full above `high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MembershipBreakpoints {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl Default for MembershipBreakpoints {
    fn default() -> Self {
        Self {
            low: 0.3,
            mid: 0.5,
            high: 0.7,
        }
    }
}

impl MembershipBreakpoints {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered =
            0.0 <= self.low && self.low < self.mid && self.mid < self.high && self.high <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(ConfigError::InvalidRule {
                index: 0,
                reason: format!(
                    "breakpoints must satisfy 0 <= low < mid < high <= 1 (got {}, {}, {})",
                    self.low, self.mid, self.high
                ),
            })
        }
    }

    /// Degree to which `x` belongs to `term`
    pub fn membership(&self, term: FuzzyTerm, x: f64) -> f64 {
        match term {
            FuzzyTerm::Low => falling(x, self.low, self.mid),
            FuzzyTerm::Medium => triangle(x, self.low, self.mid, self.high),
            FuzzyTerm::High => rising(x, self.mid, self.high),
        }
    }
}

/// 1 below `a`, 0 above `b`, linear between
fn falling(x: f64, a: f64, b: f64) -> f64 {
    if x <= a {
        1.0
    } else if x >= b {
        0.0
    } else {
        (b - x) / (b - a)
    }
}

/// 0 below `a`, 1 above `b`, linear between
fn rising(x: f64, a: f64, b: f64) -> f64 {
    1.0 - falling(x, a, b)
}

fn triangle(x: f64, a: f64, peak: f64, c: f64) -> f64 {
    if x <= a || x >= c {
        0.0
    } else if x <= peak {
        (x - a) / (peak - a)
    } else {
        (c - x) / (c - peak)
    }
}

/// One antecedent clause: `<signal> is <term>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyCondition {
    pub signal: SignalName,
    pub is: FuzzyTerm,
}

/// `IF all conditions THEN term`, scaled by a strength weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyRule {
    pub when: Vec<FuzzyCondition>,
    pub then: FuzzyTerm,
    #[serde(default = "default_rule_weight")]
    pub weight: f64,
}

fn default_rule_weight() -> f64 {
    1.0
}

impl FuzzyRule {
    pub fn new(when: Vec<(SignalName, FuzzyTerm)>, then: FuzzyTerm) -> Self {
        Self {
            when: when
                .into_iter()
                .map(|(signal, is)| FuzzyCondition { signal, is })
                .collect(),
            then,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Static rule table plus the partitions it is evaluated with
#[derive(Debug, Clone)]
pub struct FuzzyRuleSet {
    rules: Vec<FuzzyRule>,
    breakpoints: MembershipBreakpoints,
    resolution: usize,
}

impl FuzzyRuleSet {
    /// Validate and build a rule set against the configured signal names
    pub fn new(
        rules: Vec<FuzzyRule>,
        breakpoints: MembershipBreakpoints,
        resolution: usize,
        signals: &[SignalName],
    ) -> Result<Self, ConfigError> {
        if rules.is_empty() {
            return Err(ConfigError::EmptyRuleTable);
        }
        breakpoints.validate()?;
        if resolution < 2 {
            return Err(ConfigError::ZeroValue {
                field: "fuzzy.resolution",
            });
        }

        let known: BTreeSet<_> = signals.iter().copied().collect();
        for (index, rule) in rules.iter().enumerate() {
            if rule.when.is_empty() {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: "rule has no conditions".to_string(),
                });
            }
            if !(0.0..=1.0).contains(&rule.weight) {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: format!("weight {} outside [0, 1]", rule.weight),
                });
            }
            if let Some(unknown) = rule.when.iter().find(|c| !known.contains(&c.signal)) {
                return Err(ConfigError::UnknownSignalName {
                    name: unknown.signal.to_string(),
                });
            }
        }

        Ok(Self {
            rules,
            breakpoints,
            resolution,
        })
    }

    /// The stock rule table
    ///
    /// A low `R_stab` pulls the multiplier down no matter how well the task
    /// goes. Amplification needs both stability and task success.
    pub fn default_rules() -> Vec<FuzzyRule> {
        use FuzzyTerm::*;
        use SignalName::*;
        vec![
            FuzzyRule::new(vec![(Stability, Low), (Diversity, Low)], Low),
            FuzzyRule::new(vec![(Stability, Low)], Low).with_weight(0.8),
            FuzzyRule::new(vec![(Stability, Medium)], Medium),
            FuzzyRule::new(vec![(Stability, High), (Task, High)], High),
            FuzzyRule::new(vec![(Stability, High), (Task, Medium)], Medium),
            FuzzyRule::new(vec![(Stability, High), (Task, Low)], Medium).with_weight(0.6),
            FuzzyRule::new(vec![(Attractor, Low)], Low).with_weight(0.5),
        ]
    }

    pub fn rules(&self) -> &[FuzzyRule] {
        &self.rules
    }

    pub fn breakpoints(&self) -> &MembershipBreakpoints {
        &self.breakpoints
    }

    /// Firing strength of each rule; rules touching an absent signal do not fire
    pub fn activations(&self, inputs: &SignalSet) -> Vec<f64> {
        self.rules
            .iter()
            .map(|rule| {
                let degree = rule.when.iter().try_fold(1.0f64, |acc, condition| {
                    inputs
                        .get(condition.signal)
                        .map(|x| acc.min(self.breakpoints.membership(condition.is, x)))
                });
                degree.map_or(0.0, |d| d * rule.weight)
            })
            .collect()
    }

    /// Infer and defuzzify to a raw multiplier in `bounds`
    pub fn infer(&self, inputs: &SignalSet, bounds: &MultiplierBounds) -> f64 {
        let activations = self.activations(inputs);
        let neutral = output_neutral(bounds);
        if activations.iter().all(|a| *a <= 0.0) {
            return neutral;
        }

        let steps = self.resolution - 1;
        let mut weighted = 0.0;
        let mut mass = 0.0;
        for i in 0..=steps {
            let x = bounds.min + bounds.span() * i as f64 / steps as f64;
            let mu = self
                .rules
                .iter()
                .zip(&activations)
                .map(|(rule, activation)| {
                    activation.min(output_membership(rule.then, x, bounds, neutral))
                })
                .fold(0.0f64, f64::max);
            weighted += x * mu;
            mass += mu;
        }

        if mass <= 0.0 {
            neutral
        } else {
            weighted / mass
        }
    }
}

/// Peak of the `Medium` output term
fn output_neutral(bounds: &MultiplierBounds) -> f64 {
    if NEUTRAL_MULTIPLIER > bounds.min && NEUTRAL_MULTIPLIER < bounds.max {
        NEUTRAL_MULTIPLIER
    } else {
        bounds.min + bounds.span() / 2.0
    }
}

fn output_membership(term: FuzzyTerm, x: f64, bounds: &MultiplierBounds, neutral: f64) -> f64 {
    match term {
        FuzzyTerm::Low => falling(x, bounds.min, neutral),
        FuzzyTerm::Medium => triangle(x, bounds.min, neutral, bounds.max),
        FuzzyTerm::High => rising(x, neutral, bounds.max),
    }
}
