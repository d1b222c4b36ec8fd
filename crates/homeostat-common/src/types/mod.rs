//! Core data types for the Homeostat regulator

pub mod outcome;
pub mod signal;
pub mod weights;
