//! # Integration Scenarios
//!
//! Cross-crate flows over the simulated network.

pub mod delivery_flows;
pub mod failure_injection;
pub mod lifecycle_flows;
