//! SignalHistory - fixed-capacity rolling window per signal
//!
//! Oldest values are evicted first once a series reaches capacity. Trend is
//! the least-squares slope over the trailing `trend_window` entries.

use std::collections::{HashMap, VecDeque};

use homeostat_common::{SignalName, DEFAULT_HISTORY_CAPACITY, DEFAULT_TREND_WINDOW};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SignalHistory {
    capacity: usize,
    trend_window: usize,
    series: HashMap<SignalName, VecDeque<f64>>,
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_TREND_WINDOW)
    }
}

impl SignalHistory {
    pub fn new(capacity: usize, trend_window: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            trend_window: trend_window.max(2),
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn trend_window(&self) -> usize {
        self.trend_window
    }

    /// Append a value, evicting the oldest at capacity
    ///
    /// Non-finite values are rejected and `false` is returned.
    pub fn record(&mut self, name: SignalName, value: f64) -> bool {
        if !value.is_finite() {
            warn!(signal = %name, value, "Rejected non-finite history value");
            return false;
        }
        let capacity = self.capacity;
        let series = self
            .series
            .entry(name)
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if series.len() == capacity {
            series.pop_front();
        }
        series.push_back(value);
        true
    }

    pub fn len(&self, name: SignalName) -> usize {
        self.series.get(&name).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    pub fn last(&self, name: SignalName) -> Option<f64> {
        self.series.get(&name).and_then(|s| s.back().copied())
    }

    /// Current window, oldest first
    pub fn window(&self, name: SignalName) -> Vec<f64> {
        self.series
            .get(&name)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The last `k` values, oldest first
    pub fn tail(&self, name: SignalName, k: usize) -> Vec<f64> {
        match self.series.get(&name) {
            Some(series) => series
                .iter()
                .skip(series.len().saturating_sub(k))
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Least-squares slope per step over the trend window; 0.0 below 2 entries
    pub fn trend(&self, name: SignalName) -> f64 {
        slope(&self.tail(name, self.trend_window))
    }

    pub fn mean(&self, name: SignalName) -> f64 {
        match self.series.get(&name) {
            Some(series) if !series.is_empty() => series.iter().sum::<f64>() / series.len() as f64,
            _ => 0.0,
        }
    }

    /// Population variance over the current window
    pub fn variance(&self, name: SignalName) -> f64 {
        match self.series.get(&name) {
            Some(series) if !series.is_empty() => {
                let mean = self.mean(name);
                series.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / series.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}

/// Least-squares slope of `values` against their index
pub(crate) fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
