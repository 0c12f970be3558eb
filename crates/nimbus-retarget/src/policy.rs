//! Retarget policies.
//!
//! Every policy shares one contract: given a universe, a market-data feed,
//! and the current time, produce weights and then a [`Target`]. Only the
//! activation-gated policy carries state between ticks.

use std::collections::BTreeMap;
use std::path::PathBuf;

use nimbus_core::Rational;
use nimbus_core::error::{ConfigError, ExternalError, NimbusError};
use nimbus_core::traits::DataFeed;
use nimbus_core::types::{HistoryInterval, Target};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activation::ActivationTable;
use crate::signals;
use crate::universe::UniverseAsset;
use crate::weights::{self, Weights};

const HOUR_SECS: u64 = 3_600;
const DAY_SECS: u64 = 86_400;

/// Policy as written in a job file, tagged by `kind`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicySpec {
    /// `w ∝ market cap`.
    MarketCap,
    /// `w ∝ 1 / trailing P/E`.
    ReciprocalPe,
    /// `w ∝ TVL`.
    Tvl,
    /// Top `top_k` assets by positive change over `lookback_days`.
    Momentum { top_k: usize, lookback_days: u64 },
    /// Assets whose `window_hours` change exceeds `threshold` stay active
    /// for `hold_hours`; each active asset takes its market-cap share
    /// capped at `cap`, and the rest goes to `reserve`.
    Activation {
        window_hours: u64,
        threshold: Rational,
        hold_hours: u64,
        cap: Rational,
        reserve: UniverseAsset,
        #[serde(default)]
        table_path: Option<PathBuf>,
    },
    /// Moving-average cross scored by smoothed next-bar-up rate.
    MaCross {
        lookback_days: u64,
        min_len: usize,
        max_len: usize,
        threshold: Rational,
        /// Portfolio share given to assets without a bullish cross.
        deweight_share: Rational,
    },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn is_fraction(r: &Rational) -> bool {
    !r.is_negative() && *r <= Rational::one()
}

impl PolicySpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::MarketCap | Self::ReciprocalPe | Self::Tvl => Ok(()),
            Self::Momentum {
                top_k,
                lookback_days,
            } => {
                if *top_k == 0 {
                    return Err(invalid("top_k", "must be at least 1"));
                }
                if *lookback_days == 0 {
                    return Err(invalid("lookback_days", "must be at least 1"));
                }
                Ok(())
            }
            Self::Activation {
                window_hours,
                hold_hours,
                cap,
                ..
            } => {
                if *window_hours == 0 || *hold_hours == 0 {
                    return Err(invalid("window_hours", "windows must be at least one hour"));
                }
                if !cap.is_positive() || !is_fraction(cap) {
                    return Err(invalid("cap", "must be in (0, 1]"));
                }
                Ok(())
            }
            Self::MaCross {
                lookback_days,
                min_len,
                max_len,
                deweight_share,
                ..
            } => {
                if *min_len == 0 || min_len > max_len {
                    return Err(invalid("min_len", "need 1 <= min_len <= max_len"));
                }
                if *lookback_days <= *max_len as u64 {
                    return Err(invalid("lookback_days", "must exceed max_len"));
                }
                if !is_fraction(deweight_share) {
                    return Err(invalid("deweight_share", "must be in [0, 1]"));
                }
                Ok(())
            }
        }
    }

    /// Validate and build the runtime policy, loading any persisted state.
    pub fn build(&self) -> Result<Policy, NimbusError> {
        self.validate()?;
        Ok(match self.clone() {
            Self::MarketCap => Policy::MarketCap,
            Self::ReciprocalPe => Policy::ReciprocalPe,
            Self::Tvl => Policy::Tvl,
            Self::Momentum {
                top_k,
                lookback_days,
            } => Policy::Momentum {
                top_k,
                lookback_days,
            },
            Self::Activation {
                window_hours,
                threshold,
                hold_hours,
                cap,
                reserve,
                table_path,
            } => {
                let table = match &table_path {
                    Some(path) => ActivationTable::load(path)?,
                    None => ActivationTable::new(),
                };
                Policy::Activation(ActivationPolicy {
                    window_hours,
                    threshold,
                    hold_hours,
                    cap,
                    reserve,
                    table,
                    table_path,
                })
            }
            Self::MaCross {
                lookback_days,
                min_len,
                max_len,
                threshold,
                deweight_share,
            } => Policy::MaCross(MaCrossPolicy {
                lookback_days,
                min_len,
                max_len,
                threshold,
                deweight_share,
            }),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationPolicy {
    pub window_hours: u64,
    pub threshold: Rational,
    pub hold_hours: u64,
    pub cap: Rational,
    pub reserve: UniverseAsset,
    pub table: ActivationTable,
    pub table_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaCrossPolicy {
    pub lookback_days: u64,
    pub min_len: usize,
    pub max_len: usize,
    pub threshold: Rational,
    pub deweight_share: Rational,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Policy {
    MarketCap,
    ReciprocalPe,
    Tvl,
    Momentum { top_k: usize, lookback_days: u64 },
    Activation(ActivationPolicy),
    MaCross(MaCrossPolicy),
}

fn feed_ids(universe: &[UniverseAsset]) -> Vec<String> {
    universe.iter().map(|a| a.feed_id.clone()).collect()
}

/// Pair each universe asset with its entry in `values`, skipping absent ones.
fn keyed(universe: &[UniverseAsset], values: &BTreeMap<String, Rational>) -> Weights {
    universe
        .iter()
        .filter_map(|a| values.get(&a.feed_id).map(|v| (a.clone(), v.clone())))
        .collect()
}

/// Split `share` of the portfolio across `weights` in proportion.
fn scale_into(weights: Weights, share: &Rational) -> Weights {
    let total: Rational = weights.iter().map(|(_, w)| w).sum();
    weights
        .into_iter()
        .filter_map(|(a, w)| (&w * share).checked_div(&total).map(|s| (a, s)))
        .collect()
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MarketCap => "market_cap",
            Self::ReciprocalPe => "reciprocal_pe",
            Self::Tvl => "tvl",
            Self::Momentum { .. } => "momentum",
            Self::Activation(_) => "activation",
            Self::MaCross(_) => "ma_cross",
        }
    }

    /// Unnormalized weights over (a subset of) `universe`.
    pub async fn compute_weights(
        &mut self,
        universe: &[UniverseAsset],
        feed: &dyn DataFeed,
        now: u64,
    ) -> Result<Weights, NimbusError> {
        match self {
            Self::MarketCap => {
                let caps = feed.get_market_caps(&feed_ids(universe)).await?;
                Ok(keyed(universe, &caps))
            }
            Self::ReciprocalPe => {
                let mut out = Weights::new();
                for asset in universe {
                    let Some(symbol) = &asset.symbol else {
                        continue;
                    };
                    let fundamentals = feed.get_fundamentals(symbol).await?;
                    match fundamentals.trailing_pe.as_ref().and_then(Rational::recip) {
                        Some(w) if w.is_positive() => out.push((asset.clone(), w)),
                        _ => debug!(%symbol, "no positive P/E, skipped"),
                    }
                }
                Ok(out)
            }
            Self::Tvl => {
                let mut out = Weights::new();
                for asset in universe {
                    if let Some(slug) = &asset.tvl_slug {
                        out.push((asset.clone(), feed.get_tvl(slug).await?));
                    }
                }
                Ok(out)
            }
            Self::Momentum {
                top_k,
                lookback_days,
            } => {
                let from = now.saturating_sub(lookback_days.saturating_mul(DAY_SECS));
                let mut ranked = Weights::new();
                for asset in universe {
                    let history = feed
                        .get_price_history(&asset.feed_id, HistoryInterval::Daily, from, now)
                        .await?;
                    if let Some(change) = signals::change(&history).filter(Rational::is_positive) {
                        ranked.push((asset.clone(), change));
                    }
                }
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.feed_id.cmp(&b.0.feed_id)));
                ranked.truncate(*top_k);
                Ok(ranked)
            }
            Self::Activation(policy) => policy.compute_weights(universe, feed, now).await,
            Self::MaCross(policy) => policy.compute_weights(universe, feed, now).await,
        }
    }

    /// Target for `universe` at `now`, or `None` when the policy finds
    /// nothing to allocate to.
    pub async fn compute_target(
        &mut self,
        universe: &[UniverseAsset],
        feed: &dyn DataFeed,
        now: u64,
        scale: u128,
    ) -> Result<Option<Target>, NimbusError> {
        let raw = self.compute_weights(universe, feed, now).await?;
        if !raw.iter().any(|(_, w)| w.is_positive()) {
            return Ok(None);
        }
        let normalized = weights::normalize(raw)?;
        let ids: Vec<String> = normalized.iter().map(|(a, _)| a.feed_id.clone()).collect();
        let prices = feed.get_spot_prices(&ids).await?;
        if let Some(missing) = ids.iter().find(|id| !prices.contains_key(*id)) {
            return Err(ExternalError::Unavailable(format!("no spot price for {missing}")).into());
        }
        Ok(Some(weights::to_target(&normalized, &prices, scale)?))
    }
}

impl ActivationPolicy {
    async fn compute_weights(
        &mut self,
        universe: &[UniverseAsset],
        feed: &dyn DataFeed,
        now: u64,
    ) -> Result<Weights, NimbusError> {
        let from = now.saturating_sub(self.window_hours.saturating_mul(HOUR_SECS));
        for asset in universe {
            let history = feed
                .get_price_history(&asset.feed_id, HistoryInterval::Hourly, from, now)
                .await?;
            if let Some(change) = signals::change(&history) {
                if change > self.threshold {
                    let until = now.saturating_add(self.hold_hours.saturating_mul(HOUR_SECS));
                    info!(asset = %asset.feed_id, %change, until, "activated");
                    self.table.activate(&asset.feed_id, until);
                }
            }
        }
        let expired = self.table.prune(now);
        if expired > 0 {
            debug!(expired, "pruned activations");
        }
        if let Some(path) = &self.table_path {
            self.table.save(path)?;
        }

        let active: Vec<UniverseAsset> = universe
            .iter()
            .filter(|a| self.table.is_active(&a.feed_id, now))
            .cloned()
            .collect();
        let mut out = Weights::new();
        if !active.is_empty() {
            let caps = feed.get_market_caps(&feed_ids(&active)).await?;
            for (asset, share) in scale_into(keyed(&active, &caps), &Rational::one()) {
                let w = share.min(self.cap.clone());
                out.push((asset, w));
            }
        }
        let invested: Rational = out.iter().map(|(_, w)| w).sum();
        let reserve = Rational::one() - invested;
        if reserve.is_positive() {
            out.push((self.reserve.clone(), reserve));
        }
        Ok(out)
    }
}

impl MaCrossPolicy {
    async fn compute_weights(
        &self,
        universe: &[UniverseAsset],
        feed: &dyn DataFeed,
        now: u64,
    ) -> Result<Weights, NimbusError> {
        let caps = feed.get_market_caps(&feed_ids(universe)).await?;
        let from = now.saturating_sub(self.lookback_days.saturating_mul(DAY_SECS));

        let mut bullish = Weights::new();
        let mut rest = Weights::new();
        for asset in universe {
            let Some(cap) = caps.get(&asset.feed_id).filter(|c| c.is_positive()) else {
                continue;
            };
            let history = feed
                .get_price_history(&asset.feed_id, HistoryInterval::Daily, from, now)
                .await?;
            let prices: Vec<Rational> = history.into_iter().map(|p| p.price).collect();
            let stats = signals::best_cross(&prices, self.min_len, self.max_len);
            match stats {
                Some(s) if s.bullish && s.rate > self.threshold => {
                    debug!(asset = %asset.feed_id, len = s.len, rate = %s.rate, "bullish cross");
                    bullish.push((asset.clone(), (&s.rate - &self.threshold) * cap));
                }
                _ => rest.push((asset.clone(), cap.clone())),
            }
        }

        Ok(match (bullish.is_empty(), rest.is_empty()) {
            (true, _) => rest,
            (false, true) => bullish,
            (false, false) => {
                let invested = Rational::one() - &self.deweight_share;
                let mut out = scale_into(bullish, &invested);
                out.extend(scale_into(rest, &self.deweight_share));
                out
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::types::{AssetInfo, Fundamentals, PricePoint};
    use nimbus_feed::MemoryFeed;
    use serde_json::json;

    const NOW: u64 = 1_700_000_000;

    fn r(n: u64) -> Rational {
        Rational::from(n)
    }

    fn frac(n: i128, d: i128) -> Rational {
        Rational::from_ratio(n, d).unwrap()
    }

    fn asset(id: &str) -> UniverseAsset {
        UniverseAsset::new(AssetInfo::token(format!("terra1{id}")), id)
    }

    fn ust() -> UniverseAsset {
        UniverseAsset::new(AssetInfo::native("uusd"), "terrausd")
    }

    fn daily(values: &[u64]) -> Vec<PricePoint> {
        let start = NOW - (values.len() as u64 - 1) * DAY_SECS;
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| PricePoint {
                timestamp: start + i as u64 * DAY_SECS,
                price: r(v),
            })
            .collect()
    }

    fn hourly(values: &[u64]) -> Vec<PricePoint> {
        let start = NOW - (values.len() as u64 - 1) * HOUR_SECS;
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| PricePoint {
                timestamp: start + i as u64 * HOUR_SECS,
                price: r(v),
            })
            .collect()
    }

    fn shares(w: &Weights) -> Vec<(&str, Rational)> {
        w.iter().map(|(a, w)| (a.feed_id.as_str(), w.clone())).collect()
    }

    // --- PolicySpec parsing ---

    #[test]
    fn policy_spec_is_tagged_by_kind() {
        let spec: PolicySpec = serde_json::from_value(json!({"kind": "market_cap"})).unwrap();
        assert_eq!(spec, PolicySpec::MarketCap);

        let spec: PolicySpec = serde_json::from_value(json!({
            "kind": "ma_cross",
            "lookback_days": 60,
            "min_len": 3,
            "max_len": 20,
            "threshold": "0.5",
            "deweight_share": 0.2
        }))
        .unwrap();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.build().unwrap().name(), "ma_cross");
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let momentum = PolicySpec::Momentum {
            top_k: 0,
            lookback_days: 30,
        };
        assert!(momentum.validate().is_err());

        let cross = PolicySpec::MaCross {
            lookback_days: 10,
            min_len: 5,
            max_len: 20,
            threshold: frac(1, 2),
            deweight_share: frac(1, 5),
        };
        assert!(cross.build().is_err());

        let activation = PolicySpec::Activation {
            window_hours: 24,
            threshold: frac(1, 10),
            hold_hours: 72,
            cap: frac(3, 2),
            reserve: ust(),
            table_path: None,
        };
        assert!(activation.validate().is_err());
    }

    // --- proportional policies ---

    #[tokio::test]
    async fn market_cap_weights_skip_unknown_assets() {
        let feed = MemoryFeed::new()
            .with_market_cap("luna", r(3_000))
            .with_market_cap("mir", r(1_000));
        let universe = [asset("luna"), asset("mir"), asset("anc")];
        let w = Policy::MarketCap
            .compute_weights(&universe, &feed, NOW)
            .await
            .unwrap();
        assert_eq!(shares(&w), vec![("luna", r(3_000)), ("mir", r(1_000))]);
    }

    #[tokio::test]
    async fn reciprocal_pe_skips_missing_and_negative() {
        let pe = |v: Option<i64>| Fundamentals {
            trailing_pe: v.map(Rational::from),
            market_cap: None,
        };
        let feed = MemoryFeed::new()
            .with_fundamentals("AAPL", pe(Some(25)))
            .with_fundamentals("TSLA", pe(Some(-40)))
            .with_fundamentals("GME", pe(None));
        let universe = [
            asset("maapl").with_symbol("AAPL"),
            asset("mtsla").with_symbol("TSLA"),
            asset("mgme").with_symbol("GME"),
            asset("luna"),
        ];
        let w = Policy::ReciprocalPe
            .compute_weights(&universe, &feed, NOW)
            .await
            .unwrap();
        assert_eq!(shares(&w), vec![("maapl", frac(1, 25))]);
    }

    #[tokio::test]
    async fn tvl_policy_uses_slugs() {
        let feed = MemoryFeed::new().with_tvl("anchor", r(9)).with_tvl("mirror", r(1));
        let universe = [
            asset("anc").with_tvl_slug("anchor"),
            asset("mir").with_tvl_slug("mirror"),
            asset("luna"),
        ];
        let w = Policy::Tvl.compute_weights(&universe, &feed, NOW).await.unwrap();
        assert_eq!(shares(&w), vec![("anc", r(9)), ("mir", r(1))]);
    }

    #[tokio::test]
    async fn tvl_outage_propagates() {
        let feed = MemoryFeed::new();
        let universe = [asset("anc").with_tvl_slug("anchor")];
        let err = Policy::Tvl
            .compute_weights(&universe, &feed, NOW)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    // --- momentum ---

    #[tokio::test]
    async fn momentum_keeps_top_k_positive() {
        let feed = MemoryFeed::new()
            .with_history("a", daily(&[100, 150]))
            .with_history("b", daily(&[100, 120]))
            .with_history("c", daily(&[100, 200]))
            .with_history("d", daily(&[100, 90]));
        let universe = [asset("a"), asset("b"), asset("c"), asset("d")];
        let mut policy = Policy::Momentum {
            top_k: 2,
            lookback_days: 7,
        };
        let w = policy.compute_weights(&universe, &feed, NOW).await.unwrap();
        assert_eq!(shares(&w), vec![("c", r(1)), ("a", frac(1, 2))]);
    }

    #[tokio::test]
    async fn momentum_with_no_gainers_has_no_target() {
        let feed = MemoryFeed::new().with_history("a", daily(&[100, 90]));
        let mut policy = Policy::Momentum {
            top_k: 3,
            lookback_days: 7,
        };
        let target = policy
            .compute_target(&[asset("a")], &feed, NOW, 100_000_000)
            .await
            .unwrap();
        assert_eq!(target, None);
    }

    // --- activation ---

    fn activation(cap: Rational) -> Policy {
        PolicySpec::Activation {
            window_hours: 24,
            threshold: frac(1, 10),
            hold_hours: 48,
            cap,
            reserve: ust(),
            table_path: None,
        }
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn activation_caps_and_fills_reserve() {
        let feed = MemoryFeed::new()
            .with_history("luna", hourly(&[100, 130]))
            .with_history("mir", hourly(&[100, 105]))
            .with_market_cap("luna", r(3_000))
            .with_market_cap("mir", r(1_000));
        let universe = [asset("luna"), asset("mir")];
        let mut policy = activation(frac(1, 2));

        let w = policy.compute_weights(&universe, &feed, NOW).await.unwrap();
        assert_eq!(shares(&w), vec![("luna", frac(1, 2)), ("terrausd", frac(1, 2))]);
    }

    #[tokio::test]
    async fn activation_holds_then_expires() {
        let feed = MemoryFeed::new()
            .with_history("luna", hourly(&[100, 130]))
            .with_market_cap("luna", r(3_000));
        let universe = [asset("luna")];
        let mut policy = activation(Rational::one());

        let w = policy.compute_weights(&universe, &feed, NOW).await.unwrap();
        assert_eq!(shares(&w), vec![("luna", r(1))]);

        // A day later the spike is out of the window but the hold remains.
        let later = NOW + DAY_SECS;
        let w = policy.compute_weights(&universe, &feed, later).await.unwrap();
        assert_eq!(shares(&w), vec![("luna", r(1))]);

        let expired = NOW + 3 * DAY_SECS;
        let w = policy.compute_weights(&universe, &feed, expired).await.unwrap();
        assert_eq!(shares(&w), vec![("terrausd", r(1))]);
        let Policy::Activation(state) = &policy else {
            unreachable!()
        };
        assert!(state.table.is_empty());
    }

    #[tokio::test]
    async fn activation_table_persists_between_builds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activation.bin");
        let spec = PolicySpec::Activation {
            window_hours: 24,
            threshold: frac(1, 10),
            hold_hours: 48,
            cap: Rational::one(),
            reserve: ust(),
            table_path: Some(path.clone()),
        };
        let feed = MemoryFeed::new().with_history("luna", hourly(&[100, 130]));
        spec.build()
            .unwrap()
            .compute_weights(&[asset("luna")], &feed, NOW)
            .await
            .unwrap();

        let Policy::Activation(rebuilt) = spec.build().unwrap() else {
            unreachable!()
        };
        assert_eq!(rebuilt.table.expiry("luna"), Some(NOW + 48 * HOUR_SECS));
    }

    #[tokio::test]
    async fn activation_saturates_huge_windows() {
        let feed = MemoryFeed::new()
            .with_history("luna", hourly(&[100, 130]))
            .with_market_cap("luna", r(3_000));
        let mut policy = PolicySpec::Activation {
            window_hours: u64::MAX,
            threshold: frac(1, 10),
            hold_hours: u64::MAX,
            cap: Rational::one(),
            reserve: ust(),
            table_path: None,
        }
        .build()
        .unwrap();

        let w = policy.compute_weights(&[asset("luna")], &feed, NOW).await.unwrap();
        assert_eq!(shares(&w), vec![("luna", r(1))]);
        let Policy::Activation(state) = &policy else {
            unreachable!()
        };
        assert_eq!(state.table.expiry("luna"), Some(u64::MAX));
    }

    // --- moving-average cross ---

    #[tokio::test]
    async fn ma_cross_splits_bullish_and_deweighted() {
        let feed = MemoryFeed::new()
            .with_history("up", daily(&[1, 2, 3, 4, 5, 6, 7, 8]))
            .with_history("down", daily(&[8, 7, 6, 5, 4, 3, 2, 1]))
            .with_market_cap("up", r(100))
            .with_market_cap("down", r(100));
        let mut policy = PolicySpec::MaCross {
            lookback_days: 30,
            min_len: 2,
            max_len: 3,
            threshold: frac(1, 2),
            deweight_share: frac(1, 4),
        }
        .build()
        .unwrap();
        let w = policy
            .compute_weights(&[asset("up"), asset("down")], &feed, NOW)
            .await
            .unwrap();
        assert_eq!(shares(&w), vec![("up", frac(3, 4)), ("down", frac(1, 4))]);
    }

    #[tokio::test]
    async fn ma_cross_without_signal_falls_back_to_market_cap() {
        let feed = MemoryFeed::new()
            .with_history("a", daily(&[8, 7, 6, 5, 4]))
            .with_market_cap("a", r(3))
            .with_market_cap("b", r(1));
        let mut policy = PolicySpec::MaCross {
            lookback_days: 30,
            min_len: 2,
            max_len: 3,
            threshold: frac(1, 2),
            deweight_share: frac(1, 4),
        }
        .build()
        .unwrap();
        let w = policy
            .compute_weights(&[asset("a"), asset("b")], &feed, NOW)
            .await
            .unwrap();
        assert_eq!(shares(&w), vec![("a", r(3)), ("b", r(1))]);
    }

    // --- target conversion ---

    #[tokio::test]
    async fn compute_target_prices_weights() {
        let feed = MemoryFeed::new()
            .with_market_cap("luna", r(3_000))
            .with_market_cap("mir", r(1_000))
            .with_spot("luna", r(80))
            .with_spot("mir", r(2));
        let target = Policy::MarketCap
            .compute_target(&[asset("luna"), asset("mir")], &feed, NOW, 100_000_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.amounts(), vec![937_500, 12_500_000]);
    }

    #[tokio::test]
    async fn missing_spot_price_is_transient() {
        let feed = MemoryFeed::new().with_market_cap("luna", r(1));
        let err = Policy::MarketCap
            .compute_target(&[asset("luna")], &feed, NOW, 100_000_000)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
