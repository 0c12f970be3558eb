//! Trait interfaces between Nimbus crates and their collaborators.
//!
//! - [`PenaltyCalculator`]: imbalance scoring and EMA state (nimbus-penalty implements)
//! - [`PricingOracle`]: per-asset price quotes consumed by the cluster engine
//! - [`BlockchainClient`]: contract upload, instantiate, execute, query
//!   (nimbus-chain and the nimbus-cluster simulator implement)
//! - [`DataFeed`]: market data consumed by the retargeter (nimbus-feed implements)

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::decimal::Rational;
use crate::error::{ClusterError, ExternalError, NimbusError};
use crate::types::{
    AssetInfo, Coin, Fundamentals, HistoryInterval, PenaltyParams, PricePoint, PriceQuote,
    TxResult,
};

/// Scores inventory moves and tracks the notional EMA.
///
/// The cluster engine owns one boxed calculator and replaces it wholesale
/// on governance action; parameters are never mutated in place.
pub trait PenaltyCalculator: Send + Sync + fmt::Debug {
    fn params(&self) -> &PenaltyParams;

    /// EMA as of [`last_block`](Self::last_block).
    fn ema(&self) -> &Rational;

    fn last_block(&self) -> u64;

    /// Signed adjustment for moving inventory from `i0` to `i1`.
    ///
    /// Negative when the move worsens alignment to `w`, non-negative
    /// otherwise. Fails with [`ClusterError::ClusterImbalanceTooHigh`] when a
    /// worsening move ends above the absolute ceiling.
    fn notional_penalty(
        &self,
        height: u64,
        i0: &[Rational],
        i1: &[Rational],
        w: &[Rational],
        p: &[Rational],
    ) -> Result<Rational, ClusterError>;

    /// Fold `nav` into the EMA at `height` and record `height` as the last block.
    fn update_ema(&mut self, height: u64, nav: &Rational);
}

/// Source of asset prices in the base denom.
pub trait PricingOracle: Send + Sync {
    fn quote(&self, asset: &AssetInfo) -> Result<PriceQuote, ClusterError>;
}

/// Contract-level access to a CosmWasm chain.
///
/// Messages are JSON values in the single-key envelope convention; see
/// [`crate::msg`] for the typed forms.
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    /// Store wasm bytecode and return its code id.
    async fn upload_code(&self, wasm: &[u8]) -> Result<u64, NimbusError>;

    /// Instantiate `code_id` and return the new contract address.
    async fn instantiate(&self, code_id: u64, init_msg: &Value) -> Result<String, NimbusError>;

    async fn execute(
        &self,
        contract: &str,
        msg: &Value,
        funds: &[Coin],
    ) -> Result<TxResult, NimbusError>;

    async fn query(&self, contract: &str, query: &Value) -> Result<Value, NimbusError>;

    async fn current_block_height(&self) -> Result<u64, NimbusError>;
}

/// Market data for the retargeter.
///
/// Identifiers are vendor ids (e.g. CoinGecko coin ids); missing entries are
/// simply absent from the returned maps.
#[async_trait]
pub trait DataFeed: Send + Sync {
    async fn get_spot_prices(&self, ids: &[String])
    -> Result<BTreeMap<String, Rational>, ExternalError>;

    /// Samples in ascending timestamp order within `[from_ts, to_ts]`.
    async fn get_price_history(
        &self,
        id: &str,
        interval: HistoryInterval,
        from_ts: u64,
        to_ts: u64,
    ) -> Result<Vec<PricePoint>, ExternalError>;

    async fn get_market_caps(&self, ids: &[String])
    -> Result<BTreeMap<String, Rational>, ExternalError>;

    async fn get_tvl(&self, slug: &str) -> Result<Rational, ExternalError>;

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, ExternalError>;
}
