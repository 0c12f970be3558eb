//! Weight normalization and conversion to integer unit targets.

use std::collections::BTreeMap;

use nimbus_core::Rational;
use nimbus_core::error::ClusterError;
use nimbus_core::types::{Asset, Target};

use crate::universe::UniverseAsset;

/// Unnormalized or normalized weights, in universe order.
pub type Weights = Vec<(UniverseAsset, Rational)>;

/// Scale weights to sum to one, dropping zero entries.
///
/// Negative weights and an all-zero vector are rejected.
pub fn normalize(weights: Weights) -> Result<Weights, ClusterError> {
    if let Some((asset, w)) = weights.iter().find(|(_, w)| w.is_negative()) {
        return Err(ClusterError::InvalidInput(format!(
            "negative weight {w} for {}",
            asset.feed_id
        )));
    }
    let total: Rational = weights.iter().map(|(_, w)| w).sum();
    weights
        .into_iter()
        .filter(|(_, w)| w.is_positive())
        .map(|(asset, w)| {
            w.checked_div(&total)
                .map(|share| (asset, share))
                .ok_or_else(|| ClusterError::InvalidInput("weights sum to zero".into()))
        })
        .collect::<Result<Weights, _>>()
        .and_then(|out| {
            if out.is_empty() {
                Err(ClusterError::InvalidInput("no positive weights".into()))
            } else {
                Ok(out)
            }
        })
}

/// `amount_k = ⌊scale · w_k / price_k⌋`, with zero amounts dropped.
///
/// `prices` is keyed by feed id; every weighted asset needs a positive price.
pub fn to_target(
    weights: &[(UniverseAsset, Rational)],
    prices: &BTreeMap<String, Rational>,
    scale: u128,
) -> Result<Target, ClusterError> {
    let scale = Rational::from(scale);
    let mut entries = Vec::with_capacity(weights.len());
    for (asset, w) in weights {
        let price = prices
            .get(&asset.feed_id)
            .filter(|p| p.is_positive())
            .ok_or_else(|| {
                ClusterError::InvalidInput(format!("no positive price for {}", asset.feed_id))
            })?;
        let amount = (&scale * w)
            .checked_div(price)
            .and_then(|a| a.floor_u128())
            .ok_or_else(|| {
                ClusterError::InvalidInput(format!("target amount of {} out of range", asset.feed_id))
            })?;
        if amount > 0 {
            entries.push(Asset::new(asset.info.clone(), amount));
        }
    }
    Target::new(entries)
}
