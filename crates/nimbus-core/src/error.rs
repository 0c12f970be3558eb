//! Error types for Nimbus.
use thiserror::Error;

use crate::decimal::Rational;

/// Domain rejections raised by the cluster engine and penalty model.
///
/// Every variant is a pure rejection: the operation that returned it left
/// cluster state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("invalid input: {0}")] InvalidInput(String),
    #[error("minted {minted} is below the minimum of {min_tokens}")] BelowMinimumMint { minted: u128, min_tokens: u128 },
    #[error("redeem costs {cost} tokens, more than the maximum of {max_tokens}")] BelowMinimumRedeem { cost: u128, max_tokens: u128 },
    #[error("cluster imbalance too high: {imbalance} > {ceiling}")] ClusterImbalanceTooHigh { imbalance: Rational, ceiling: Rational },
    #[error("insufficient inventory of {asset}: have {have}, need {need}")] InsufficientInventory { asset: String, have: u128, need: u128 },
    #[error("cluster is decommissioned")] ClusterInactive,
    #[error("price of {asset} is {age_secs}s old, threshold {threshold_secs}s")] OracleStale { asset: String, age_secs: u64, threshold_secs: u64 },
    #[error("unauthorized: {0}")] Unauthorized(String),
}

/// Failures talking to an external collaborator (chain RPC or data vendor).
///
/// Always transient from the core's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalError {
    #[error("transport: {0}")] Transport(String),
    #[error("HTTP {status}: {body}")] Status { status: u16, body: String },
    #[error("decode: {0}")] Decode(String),
    #[error("timeout")] Timeout,
    #[error("account sequence mismatch: {0}")] SequenceMismatch(String),
    #[error("unavailable: {0}")] Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required")] Missing { key: &'static str },
    #[error("{key} is invalid: {reason}")] Invalid { key: &'static str, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseRationalError {
    #[error("empty string")] Empty,
    #[error("invalid number: {0}")] Invalid(String),
    #[error("zero denominator")] ZeroDenominator,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NimbusError {
    #[error(transparent)] Cluster(#[from] ClusterError),
    #[error(transparent)] External(#[from] ExternalError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Parse(#[from] ParseRationalError),
    #[error("transaction rejected (code {code}): {log}")] Rejected { code: u32, log: String },
    #[error("serialization: {0}")] Serialization(String),
    #[error("I/O error: {0}")] Io(String),
}

impl NimbusError {
    /// Whether the failure came from an external collaborator and may
    /// succeed if simply tried again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

impl From<serde_json::Error> for NimbusError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for NimbusError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
