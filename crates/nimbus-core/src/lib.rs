//! # nimbus-core
//! Foundation types and traits for Nimbus clusters.
//!
//! - [`decimal::Rational`]: exact rational arithmetic used by every price,
//!   weight, penalty, and EMA computation
//! - [`math`]: inventory/price vector helpers and the imbalance metric
//! - [`types`] and [`msg`]: asset identifiers and the CosmWasm JSON envelopes
//! - [`traits`]: seams to the penalty model, pricing oracle, blockchain
//!   client, and market-data feed

pub mod config;
pub mod constants;
pub mod decimal;
pub mod error;
pub mod math;
pub mod msg;
pub mod traits;
pub mod types;

pub use decimal::Rational;
pub use error::{ClusterError, ExternalError, NimbusError};
