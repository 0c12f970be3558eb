//! In-memory pricing oracle.

use std::collections::BTreeMap;

use nimbus_core::error::ClusterError;
use nimbus_core::traits::PricingOracle;
use nimbus_core::types::{AssetInfo, PriceQuote};
use nimbus_core::Rational;

/// Price table keyed by asset identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticOracle {
    quotes: BTreeMap<String, PriceQuote>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `price` for `asset` as of `time` (unix seconds).
    pub fn set(&mut self, asset: &AssetInfo, price: Rational, time: u64) {
        self.quotes.insert(
            asset.identifier().to_string(),
            PriceQuote {
                price,
                last_updated: time,
            },
        );
    }

    /// Builder form of [`set`](Self::set).
    pub fn with_price(mut self, asset: &AssetInfo, price: Rational, time: u64) -> Self {
        self.set(asset, price, time);
        self
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl PricingOracle for StaticOracle {
    fn quote(&self, asset: &AssetInfo) -> Result<PriceQuote, ClusterError> {
        self.quotes
            .get(asset.identifier())
            .cloned()
            .ok_or_else(|| ClusterError::InvalidInput(format!("no price for {asset}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_returns_latest_price() {
        let luna = AssetInfo::native("uluna");
        let mut oracle = StaticOracle::new().with_price(&luna, Rational::from(80u64), 10);
        oracle.set(&luna, Rational::from(90u64), 20);
        let quote = oracle.quote(&luna).unwrap();
        assert_eq!(quote.price, Rational::from(90u64));
        assert_eq!(quote.last_updated, 20);
        assert_eq!(oracle.len(), 1);
    }

    #[test]
    fn missing_price_is_invalid_input() {
        let err = StaticOracle::new()
            .quote(&AssetInfo::token("terra1x"))
            .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }
}
