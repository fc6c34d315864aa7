//! Reusable stress-testing infrastructure for the synckit primitives.
//!
//! Kept as its own crate so both unit tests and the workspace
//! integration tests can drive the same scenarios.

pub mod scenarios;
pub mod stress;

pub use scenarios::{LockedCounter, RacyCounter};
pub use stress::{StressConfig, StressHarness, StressResult};
