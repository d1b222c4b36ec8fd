//! # Homeostat Monitors
//!
//! Signal monitors that turn raw model and trajectory observables into
//! normalized health signals in [0, 1].
//!
//! | Monitor          | Observable              | Signal    |
//! |------------------|-------------------------|-----------|
//! | Stability        | gradients / matrix      | `R_stab`  |
//! | Diversity        | output distribution     | `R_div`   |
//! | Plasticity       | parameter deltas        | `R_plast` |
//! | Attractor        | hidden-state trajectory | `R_attr`  |
//! | ExternalFeedback | caller scalar           | `R_bci`   |
//!
//! The caller's task score is forwarded as `R_task`.
//!
//! Monitors never fail: malformed input (NaN, infinities, empty or ragged
//! observables) yields the monitor's fallback value and a logged
//! [`homeostat_common::Degradation`].

pub mod monitor;
pub mod monitors;
pub mod observables;
pub mod set;

pub use monitor::SignalMonitor;
pub use monitors::{
    AttractorConfig, AttractorMonitor, DiversityConfig, DiversityMonitor, ExternalFeedbackConfig,
    ExternalFeedbackMonitor, MonitorReading, PlasticityConfig, PlasticityMonitor,
    StabilityConfig, StabilityMeasure, StabilityMonitor,
};
pub use observables::{ModelState, ObservableKind, Trajectory};
pub use set::{MonitorOutput, MonitorSet, MonitorSettings};
