//! # nimbus-cluster — Cluster engine and chain simulator.
//!
//! - [`engine::ClusterEngine`]: create/redeem state machine priced by a
//!   [`PricingOracle`](nimbus_core::traits::PricingOracle) and scored by a
//!   boxed [`PenaltyCalculator`](nimbus_core::traits::PenaltyCalculator)
//! - [`oracle::StaticOracle`]: in-memory price table
//! - [`simulator::Simulator`]: hosts engines behind the
//!   [`BlockchainClient`](nimbus_core::traits::BlockchainClient) contract

pub mod engine;
pub mod oracle;
pub mod simulator;

pub use engine::{ClusterEngine, Redemption};
pub use oracle::StaticOracle;
pub use simulator::{SimOptions, Simulator};
