//! DefiLlama: protocol TVL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use nimbus_core::Rational;
use nimbus_core::error::ExternalError;
use nimbus_core::traits::DataFeed;
use nimbus_core::types::{Fundamentals, HistoryInterval, PricePoint};
use reqwest::Client;
use serde_json::Value;

use crate::http::{self, rational};

pub const DEFAULT_BASE_URL: &str = "https://api.llama.fi";

pub struct DefiLlamaFeed {
    client: Client,
    base_url: String,
}

impl DefiLlamaFeed {
    pub fn new() -> Result<Self, ExternalError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ExternalError> {
        Ok(Self {
            client: http::client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// `/tvl/{slug}` answers with a bare number.
pub fn parse_tvl(slug: &str, body: &Value) -> Result<Rational, ExternalError> {
    let tvl = rational(body)
        .ok_or_else(|| ExternalError::Decode(format!("tvl of {slug} is not a number: {body}")))?;
    if tvl.is_negative() {
        return Err(ExternalError::Decode(format!("tvl of {slug} is negative")));
    }
    Ok(tvl)
}

#[async_trait]
impl DataFeed for DefiLlamaFeed {
    async fn get_spot_prices(&self, _ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        Err(ExternalError::Unavailable("defillama serves no spot prices".into()))
    }

    async fn get_price_history(
        &self,
        _id: &str,
        _interval: HistoryInterval,
        _from_ts: u64,
        _to_ts: u64,
    ) -> Result<Vec<PricePoint>, ExternalError> {
        Err(ExternalError::Unavailable("defillama serves no price history".into()))
    }

    async fn get_market_caps(&self, _ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        Err(ExternalError::Unavailable("defillama serves no market caps".into()))
    }

    async fn get_tvl(&self, slug: &str) -> Result<Rational, ExternalError> {
        let body = http::get_json(&self.client, &format!("{}/tvl/{slug}", self.base_url), &[]).await?;
        parse_tvl(slug, &body)
    }

    async fn get_fundamentals(&self, _symbol: &str) -> Result<Fundamentals, ExternalError> {
        Err(ExternalError::Unavailable("defillama serves no fundamentals".into()))
    }
}
