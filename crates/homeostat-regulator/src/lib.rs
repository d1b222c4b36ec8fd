//! # Homeostat Regulator
//!
//! Combines health signals into a bounded reward multiplier and keeps the
//! combination weights homeostatic.
//!
//! ## Multiplier
//!
//! ```text
//! raw        = Σ w_n × s_n            (weighted_sum, adaptive)
//!            | centroid(min/max rules) (fuzzy)
//! multiplier = clamp(raw, min, max)
//! ```
//!
//! Missing configured signals are neutral (1.0) unless the missing-signal
//! policy says otherwise. An empty signal set always yields exactly 1.0.
//!
//! ## Adaptive Weights
//!
//! Signals that track the task reward gain weight, saturated or
//! anti-correlated signals lose it. Changes are damped by an EMA (0.9 by
//! default) so the regulator does not destabilize training itself.

pub mod adaptive;
pub mod combinator;
pub mod config;
pub mod engine;
pub mod history;
pub mod registry;
pub mod telemetry;

pub use adaptive::{AdaptiveSettings, AdaptiveWeightUpdater};
pub use combinator::{
    CombinationPolicy, Combined, FuzzyCondition, FuzzyRule, FuzzyRuleSet, FuzzyTerm,
    MembershipBreakpoints, MissingSignalPolicy, PolicyKind, RewardCombinator,
};
pub use config::{FuzzySettings, RegulatorConfig, SignalWeight};
pub use engine::{CyberneticEngine, SharedEngine, WeightSnapshot};
pub use history::SignalHistory;
pub use registry::EngineRegistry;
pub use telemetry::RegulatorTelemetry;
