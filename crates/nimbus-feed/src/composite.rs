//! Routes each [`DataFeed`] method to the vendor that serves it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nimbus_core::Rational;
use nimbus_core::error::ExternalError;
use nimbus_core::traits::DataFeed;
use nimbus_core::types::{Fundamentals, HistoryInterval, PricePoint};

use crate::{CoinGeckoFeed, DefiLlamaFeed, YahooFeed};

#[derive(Clone)]
pub struct CompositeFeed {
    /// Spot prices, market caps, and history.
    pub markets: Arc<dyn DataFeed>,
    pub tvl: Arc<dyn DataFeed>,
    pub fundamentals: Arc<dyn DataFeed>,
}

impl CompositeFeed {
    pub fn new(
        markets: Arc<dyn DataFeed>,
        tvl: Arc<dyn DataFeed>,
        fundamentals: Arc<dyn DataFeed>,
    ) -> Self {
        Self {
            markets,
            tvl,
            fundamentals,
        }
    }

    /// CoinGecko, DefiLlama, and Yahoo at their public endpoints.
    pub fn public() -> Result<Self, ExternalError> {
        Ok(Self::new(
            Arc::new(CoinGeckoFeed::new()?),
            Arc::new(DefiLlamaFeed::new()?),
            Arc::new(YahooFeed::new()?),
        ))
    }
}

#[async_trait]
impl DataFeed for CompositeFeed {
    async fn get_spot_prices(&self, ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        self.markets.get_spot_prices(ids).await
    }

    async fn get_price_history(
        &self,
        id: &str,
        interval: HistoryInterval,
        from_ts: u64,
        to_ts: u64,
    ) -> Result<Vec<PricePoint>, ExternalError> {
        self.markets
            .get_price_history(id, interval, from_ts, to_ts)
            .await
    }

    async fn get_market_caps(&self, ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        self.markets.get_market_caps(ids).await
    }

    async fn get_tvl(&self, slug: &str) -> Result<Rational, ExternalError> {
        self.tvl.get_tvl(slug).await
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, ExternalError> {
        self.fundamentals.get_fundamentals(symbol).await
    }
}
