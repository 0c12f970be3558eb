//! Integration test suite for Nimbus clusters.
//!
//! Tests under `tests/` drive the engine, penalty model, simulator,
//! deployment, and retarget loop together through their public APIs.

pub mod helpers;
