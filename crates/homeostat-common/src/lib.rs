//! # Homeostat Common
//!
//! Shared types and errors for the Homeostat cybernetic reward regulator.
//!
//! ## Core Types
//!
//! - [`SignalName`]: closed set of health channels (`R_task`, `R_stab`, ...)
//! - [`SignalSet`]: one step's name → value mapping
//! - [`WeightVector`]: non-negative weights that sum to 1.0
//! - [`MultiplierBounds`]: clamp range for the reward multiplier
//! - [`RegulationOutcome`]: multiplier plus degradation report for one step
//!
//! ## Reward Formula
//!
//! ```text
//! total_reward = reward_env × multiplier
//! ```
//!
//! The multiplier is computed by the regulator; the product is left to the caller.

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, HomeostatError, Result, SignalError, WeightError};
pub use types::{
    outcome::{Degradation, DegradationReason, MultiplierBounds, RegulationOutcome},
    signal::{sanitize_unit, SignalName, SignalSet},
    weights::WeightVector,
};

/// Homeostat version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Multiplier returned when there is nothing to regulate
pub const NEUTRAL_MULTIPLIER: f64 = 1.0;

/// Default lower multiplier bound
pub const DEFAULT_MULTIPLIER_MIN: f64 = 0.1;

/// Default upper multiplier bound
pub const DEFAULT_MULTIPLIER_MAX: f64 = 2.0;

/// Default rolling history capacity per signal
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Default number of trailing entries used for trends
pub const DEFAULT_TREND_WINDOW: usize = 10;

/// Default EMA smoothing factor for adaptive weights
pub const DEFAULT_SMOOTHING: f64 = 0.9;

/// Tolerance for the weights-sum-to-one invariant
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Score reported by a monitor that could not compute a valid signal
pub const DEFAULT_FALLBACK_SCORE: f64 = 0.5;
