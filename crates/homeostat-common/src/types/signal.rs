//! Signals - normalized health indicators produced once per training step
//!
//! Every channel is named from a closed set. Values are conventionally in
//! [0, 1]; consumers clamp again before use.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of a cybernetic signal channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalName {
    /// Task performance supplied by the caller
    #[serde(rename = "R_task")]
    Task,
    /// Gradient/spectral stability
    #[serde(rename = "R_stab")]
    Stability,
    /// Output distribution entropy
    #[serde(rename = "R_div")]
    Diversity,
    /// Healthy parameter change magnitude
    #[serde(rename = "R_plast")]
    Plasticity,
    /// Hidden-state contraction toward a fixed point
    #[serde(rename = "R_attr")]
    Attractor,
    /// External (human/BCI) feedback
    #[serde(rename = "R_bci")]
    ExternalFeedback,
}

impl SignalName {
    /// Every known channel, in canonical order
    pub const ALL: [SignalName; 6] = [
        SignalName::Task,
        SignalName::Stability,
        SignalName::Diversity,
        SignalName::Plasticity,
        SignalName::Attractor,
        SignalName::ExternalFeedback,
    ];

    /// Wire name of the channel (`R_stab`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalName::Task => "R_task",
            SignalName::Stability => "R_stab",
            SignalName::Diversity => "R_div",
            SignalName::Plasticity => "R_plast",
            SignalName::Attractor => "R_attr",
            SignalName::ExternalFeedback => "R_bci",
        }
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownSignalName {
                name: s.to_string(),
            })
    }
}

/// Clamp a raw value into [0, 1], rejecting NaN and infinities
#[inline]
pub fn sanitize_unit(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// The signals observed for a single step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSet {
    values: BTreeMap<SignalName, f64>,
}

impl SignalSet {
    /// Create an empty signal set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: SignalName, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a signal, returning the previous value
    pub fn insert(&mut self, name: SignalName, value: f64) -> Option<f64> {
        self.values.insert(name, value)
    }

    pub fn get(&self, name: SignalName) -> Option<f64> {
        self.values.get(&name).copied()
    }

    pub fn remove(&mut self, name: SignalName) -> Option<f64> {
        self.values.remove(&name)
    }

    pub fn contains(&self, name: SignalName) -> bool {
        self.values.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (SignalName, f64)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }

    pub fn names(&self) -> impl Iterator<Item = SignalName> + '_ {
        self.values.keys().copied()
    }

    /// Merge another set into this one, later values win
    pub fn extend(&mut self, other: SignalSet) {
        self.values.extend(other.values);
    }
}

impl FromIterator<(SignalName, f64)> for SignalSet {
    fn from_iter<I: IntoIterator<Item = (SignalName, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
