//! In-memory [`DataFeed`] for fixtures and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use nimbus_core::Rational;
use nimbus_core::error::ExternalError;
use nimbus_core::traits::DataFeed;
use nimbus_core::types::{Fundamentals, HistoryInterval, PricePoint};
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct Tables {
    spot: BTreeMap<String, Rational>,
    caps: BTreeMap<String, Rational>,
    tvl: BTreeMap<String, Rational>,
    fundamentals: BTreeMap<String, Fundamentals>,
    history: BTreeMap<String, Vec<PricePoint>>,
    outage: Option<ExternalError>,
}

/// Fixed market data, mutable through `&self` so a running retargeter
/// can observe changes between ticks.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    tables: RwLock<Tables>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spot(self, id: &str, price: Rational) -> Self {
        self.set_spot(id, price);
        self
    }

    pub fn with_market_cap(self, id: &str, cap: Rational) -> Self {
        self.set_market_cap(id, cap);
        self
    }

    pub fn with_tvl(self, slug: &str, tvl: Rational) -> Self {
        self.tables.write().tvl.insert(slug.to_string(), tvl);
        self
    }

    pub fn with_fundamentals(self, symbol: &str, f: Fundamentals) -> Self {
        self.tables.write().fundamentals.insert(symbol.to_string(), f);
        self
    }

    /// History samples; kept sorted by timestamp.
    pub fn with_history(self, id: &str, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        self.tables.write().history.insert(id.to_string(), points);
        self
    }

    pub fn set_spot(&self, id: &str, price: Rational) {
        self.tables.write().spot.insert(id.to_string(), price);
    }

    pub fn set_market_cap(&self, id: &str, cap: Rational) {
        self.tables.write().caps.insert(id.to_string(), cap);
    }

    /// Fail every call with `err` until cleared with `None`.
    pub fn set_outage(&self, err: Option<ExternalError>) {
        self.tables.write().outage = err;
    }

    fn check(&self) -> Result<(), ExternalError> {
        match &self.tables.read().outage {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn pick(table: &BTreeMap<String, Rational>, ids: &[String]) -> BTreeMap<String, Rational> {
    ids.iter()
        .filter_map(|id| table.get(id).map(|v| (id.clone(), v.clone())))
        .collect()
}

#[async_trait]
impl DataFeed for MemoryFeed {
    async fn get_spot_prices(&self, ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        self.check()?;
        Ok(pick(&self.tables.read().spot, ids))
    }

    async fn get_price_history(
        &self,
        id: &str,
        _interval: HistoryInterval,
        from_ts: u64,
        to_ts: u64,
    ) -> Result<Vec<PricePoint>, ExternalError> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .history
            .get(id)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= from_ts && p.timestamp <= to_ts)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_market_caps(&self, ids: &[String]) -> Result<BTreeMap<String, Rational>, ExternalError> {
        self.check()?;
        Ok(pick(&self.tables.read().caps, ids))
    }

    async fn get_tvl(&self, slug: &str) -> Result<Rational, ExternalError> {
        self.check()?;
        self.tables
            .read()
            .tvl
            .get(slug)
            .cloned()
            .ok_or_else(|| ExternalError::Unavailable(format!("no tvl for {slug}")))
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, ExternalError> {
        self.check()?;
        self.tables
            .read()
            .fundamentals
            .get(symbol)
            .cloned()
            .ok_or_else(|| ExternalError::Unavailable(format!("no fundamentals for {symbol}")))
    }
}
