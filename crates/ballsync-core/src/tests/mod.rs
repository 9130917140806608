//! Cross-module tests.
//!
//! - `determinism.rs`: identical inputs give identical snapshot streams
//! - `integration.rs`: authority and observers end to end
//! - `properties.rs`: `proptest` properties of arbitration, attribution,
//!   spin and replication
//! - `helpers.rs`: setup utilities

mod helpers;
mod integration;
