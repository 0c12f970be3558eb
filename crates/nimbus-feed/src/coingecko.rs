//! CoinGecko: spot prices, market caps, and price history.

use std::collections::BTreeMap;

use async_trait::async_trait;
use nimbus_core::Rational;
use nimbus_core::error::ExternalError;
use nimbus_core::traits::DataFeed;
use nimbus_core::types::{Fundamentals, HistoryInterval, PricePoint};
use reqwest::Client;
use serde_json::Value;

use crate::http::{self, rational};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const VS_CURRENCY: &str = "usd";

pub struct CoinGeckoFeed {
    client: Client,
    base_url: String,
}

impl CoinGeckoFeed {
    pub fn new() -> Result<Self, ExternalError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ExternalError> {
        Ok(Self {
            client: http::client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn simple_price(&self, ids: &[String]) -> Result<Value, ExternalError> {
        http::get_json(
            &self.client,
            &format!("{}/simple/price", self.base_url),
            &[
                ("ids", ids.join(",")),
                ("vs_currencies", VS_CURRENCY.to_string()),
                ("include_market_cap", "true".to_string()),
            ],
        )
        .await
    }
}

/// `field` of every coin in a `/simple/price` body.
///
/// Coins without the field, or with a null value, are left out.
pub fn parse_simple_price(body: &Value, field: &str) -> Result<BTreeMap<String, Rational>, ExternalError> {
    let coins = body
        .as_object()
        .ok_or_else(|| ExternalError::Decode("simple/price body is not an object".into()))?;
    Ok(coins
        .iter()
        .filter_map(|(id, quote)| Some((id.clone(), rational(quote.get(field)?)?)))
        .collect())
}

/// Samples of a `/market_chart/range` body within `[from_ts, to_ts]`,
/// keeping the last sample of each `interval` bucket.
///
/// Timestamps arrive in milliseconds and are returned in seconds.
pub fn parse_market_chart(
    body: &Value,
    interval: HistoryInterval,
    from_ts: u64,
    to_ts: u64,
) -> Result<Vec<PricePoint>, ExternalError> {
    let prices = body
        .get("prices")
        .and_then(Value::as_array)
        .ok_or_else(|| ExternalError::Decode("market chart has no prices".into()))?;

    let step = interval.seconds();
    let mut buckets: BTreeMap<u64, PricePoint> = BTreeMap::new();
    for sample in prices {
        let pair = sample
            .as_array()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| ExternalError::Decode(format!("bad price sample {sample}")))?;
        let ms = pair[0]
            .as_f64()
            .ok_or_else(|| ExternalError::Decode(format!("bad timestamp {}", pair[0])))?;
        let Some(price) = rational(&pair[1]) else {
            continue;
        };
        let timestamp = (ms / 1000.0) as u64;
        if timestamp < from_ts || timestamp > to_ts {
            continue;
        }
        buckets.insert(timestamp / step, PricePoint { timestamp, price });
    }
    Ok(buckets.into_values().collect())
}

#[async_trait]
impl DataFeed for CoinGeckoFeed {
    async fn get_spot_prices(&self, ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        parse_simple_price(&self.simple_price(ids).await?, VS_CURRENCY)
    }

    async fn get_price_history(
        &self,
        id: &str,
        interval: HistoryInterval,
        from_ts: u64,
        to_ts: u64,
    ) -> Result<Vec<PricePoint>, ExternalError> {
        let body = http::get_json(
            &self.client,
            &format!("{}/coins/{id}/market_chart/range", self.base_url),
            &[
                ("vs_currency", VS_CURRENCY.to_string()),
                ("from", from_ts.to_string()),
                ("to", to_ts.to_string()),
            ],
        )
        .await?;
        parse_market_chart(&body, interval, from_ts, to_ts)
    }

    async fn get_market_caps(&self, ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let field = format!("{VS_CURRENCY}_market_cap");
        parse_simple_price(&self.simple_price(ids).await?, &field)
    }

    async fn get_tvl(&self, _slug: &str) -> Result<Rational, ExternalError> {
        Err(ExternalError::Unavailable("coingecko serves no TVL".into()))
    }

    async fn get_fundamentals(&self, _symbol: &str) -> Result<Fundamentals, ExternalError> {
        Err(ExternalError::Unavailable("coingecko serves no fundamentals".into()))
    }
}
