use nimbus_core::types::AssetInfo;
use serde::{Deserialize, Serialize};

/// One asset a policy may allocate to, with its market-data identifiers.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UniverseAsset {
    pub info: AssetInfo,
    /// Price/market-cap id at the market-data vendor.
    pub feed_id: String,
    /// Equity ticker, for fundamentals.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Protocol slug, for TVL.
    #[serde(default)]
    pub tvl_slug: Option<String>,
}

impl UniverseAsset {
    pub fn new(info: AssetInfo, feed_id: impl Into<String>) -> Self {
        Self {
            info,
            feed_id: feed_id.into(),
            symbol: None,
            tvl_slug: None,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_tvl_slug(mut self, slug: impl Into<String>) -> Self {
        self.tvl_slug = Some(slug.into());
        self
    }
}
