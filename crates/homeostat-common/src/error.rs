//! Error types for the Homeostat regulator
//!
//! Provides a unified error type and domain-specific error variants.
//! Only configuration errors are fatal; signal and weight problems are
//! recovered where they occur and reported as degradations.

use thiserror::Error;

/// Result type alias using HomeostatError
pub type Result<T> = std::result::Result<T, HomeostatError>;

/// Unified error type for Homeostat operations
#[derive(Debug, Error)]
pub enum HomeostatError {
    // Configuration errors (fail fast before training starts)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Signal errors
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    // Weight errors
    #[error("Weight error: {0}")]
    Weight(#[from] WeightError),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown signal name: {name}")]
    UnknownSignalName { name: String },

    #[error("No monitor produces signal {name}")]
    UnproducedSignal { name: String },

    #[error("Signal {name} is configured more than once")]
    DuplicateSignal { name: String },

    #[error("Invalid multiplier bounds: min {min} must be finite, positive and below max {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Smoothing factor must lie in [0, 1): got {0}")]
    InvalidSmoothing(f64),

    #[error("Weight for {name} must be finite and non-negative: got {weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must be finite: got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must lie in [0, 1]: got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("Fuzzy rule table is empty")]
    EmptyRuleTable,

    #[error("Invalid fuzzy rule {index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Policy {policy} requires {requirement}")]
    MissingPolicyInput {
        policy: &'static str,
        requirement: &'static str,
    },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Signal computation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalError {
    #[error("Invalid input for {signal}: {reason}")]
    InvalidSignalInput { signal: String, reason: String },

    #[error("Combined multiplier is not finite: {0}")]
    NonFiniteMultiplier(f64),
}

/// Weight maintenance errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeightError {
    #[error("All weights collapsed to zero or became non-finite (sum {sum})")]
    RenormalizationDegenerate { sum: f64 },

    #[error("Weight vector is empty")]
    Empty,
}

// Implement From for common external error types
impl From<serde_json::Error> for HomeostatError {
    fn from(err: serde_json::Error) -> Self {
        HomeostatError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for HomeostatError {
    fn from(err: config::ConfigError) -> Self {
        HomeostatError::Config(ConfigError::Load(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HomeostatError::Config(ConfigError::UnknownSignalName {
            name: "R_mood".to_string(),
        });
        assert!(err.to_string().contains("R_mood"));
    }

    #[test]
    fn test_weight_error() {
        let err = WeightError::RenormalizationDegenerate { sum: 0.0 };
        assert!(err.to_string().contains("collapsed"));
    }
}
