//! Yahoo Finance: equity fundamentals for tokenized stocks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use nimbus_core::Rational;
use nimbus_core::error::ExternalError;
use nimbus_core::traits::DataFeed;
use nimbus_core::types::{Fundamentals, HistoryInterval, PricePoint};
use reqwest::Client;
use serde_json::Value;

use crate::http::{self, rational};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

pub struct YahooFeed {
    client: Client,
    base_url: String,
}

impl YahooFeed {
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

fn raw(detail: &Value, key: &str) -> Option<Rational> {
    let field = detail.get(key)?;
    rational(field.get("raw").unwrap_or(field))
}

/// Fundamentals from a `quoteSummary?modules=summaryDetail` body.
///
/// Absent or null figures come back as `None`.
pub fn parse_quote_summary(symbol: &str, body: &Value) -> Result<Fundamentals, ExternalError> {
    let summary = body
        .get("quoteSummary")
        .ok_or_else(|| ExternalError::Decode(format!("{symbol}: no quoteSummary")))?;
    if let Some(err) = summary.get("error").filter(|e| !e.is_null()) {
        return Err(ExternalError::Unavailable(format!("{symbol}: {err}")));
    }
    let detail = summary
        .pointer("/result/0/summaryDetail")
        .ok_or_else(|| ExternalError::Decode(format!("{symbol}: no summaryDetail")))?;
    Ok(Fundamentals {
        trailing_pe: raw(detail, "trailingPE"),
        market_cap: raw(detail, "marketCap"),
    })
}

#[async_trait]
impl DataFeed for YahooFeed {
    async fn get_spot_prices(&self, _ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        Err(ExternalError::Unavailable("yahoo feed serves no spot prices".into()))
    }

    async fn get_price_history(
        &self,
        _id: &str,
        _interval: HistoryInterval,
        _from_ts: u64,
        _to_ts: u64,
    ) -> Result<Vec<PricePoint>, ExternalError> {
        Err(ExternalError::Unavailable("yahoo feed serves no price history".into()))
    }

    async fn get_market_caps(&self, _ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        Err(ExternalError::Unavailable("yahoo feed serves no market caps".into()))
    }

    async fn get_tvl(&self, _slug: &str) -> Result<Rational, ExternalError> {
        Err(ExternalError::Unavailable("yahoo feed serves no TVL".into()))
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, ExternalError> {
        let body = http::get_json(
            &self.client,
            &format!("{}/v10/finance/quoteSummary/{symbol}", self.base_url),
            &[("modules", "summaryDetail".to_string())],
        )
        .await?;
        parse_quote_summary(symbol, &body)
    }
}
