//! Cluster mint/redeem state machine.
//!
//! A [`ClusterEngine`] owns its inventory, outstanding supply, and target
//! composition. Every operation either commits completely or returns a
//! [`ClusterError`] with state untouched.

use nimbus_core::constants::DEFAULT_ORACLE_STALE_THRESHOLD_SECS;
use nimbus_core::error::ClusterError;
use nimbus_core::math::{add, dot, sub, to_rationals};
use nimbus_core::msg::{ClusterConfig, ClusterStateResponse};
use nimbus_core::traits::{PenaltyCalculator, PricingOracle};
use nimbus_core::types::{Asset, AssetInfo, BlockInfo, Target};
use nimbus_core::Rational;
use tracing::debug;

/// Assets paid out and tokens burned by a redemption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redemption {
    pub burned: u128,
    pub assets: Vec<u128>,
}

#[derive(Debug)]
pub struct ClusterEngine {
    address: String,
    config: ClusterConfig,
    assets: Vec<AssetInfo>,
    /// Unit targets aligned with `assets`; zero for held assets dropped from the target.
    weights: Vec<u128>,
    inventory: Vec<u128>,
    supply: u128,
    penalty: Box<dyn PenaltyCalculator>,
    stale_threshold_secs: u64,
}

impl ClusterEngine {
    /// A fresh, empty cluster. `config.active` is forced on.
    pub fn new(
        address: impl Into<String>,
        mut config: ClusterConfig,
        target: Target,
        penalty: Box<dyn PenaltyCalculator>,
    ) -> Result<Self, ClusterError> {
        target.validate()?;
        config.active = true;
        let assets = target.assets();
        let weights = target.amounts();
        let inventory = vec![0; assets.len()];
        Ok(Self {
            address: address.into(),
            config,
            assets,
            weights,
            inventory,
            supply: 0,
            penalty,
            stale_threshold_secs: DEFAULT_ORACLE_STALE_THRESHOLD_SECS,
        })
    }

    /// Maximum accepted age of an oracle quote.
    pub fn with_stale_threshold(mut self, secs: u64) -> Self {
        self.stale_threshold_secs = secs;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn assets(&self) -> &[AssetInfo] {
        &self.assets
    }

    pub fn weights(&self) -> &[u128] {
        &self.weights
    }

    pub fn inventory(&self) -> &[u128] {
        &self.inventory
    }

    pub fn supply(&self) -> u128 {
        self.supply
    }

    pub fn is_active(&self) -> bool {
        self.config.active
    }

    pub fn penalty(&self) -> &dyn PenaltyCalculator {
        self.penalty.as_ref()
    }

    /// Current composition, including zero-weight assets still held.
    pub fn target_entries(&self) -> Vec<Asset> {
        self.assets
            .iter()
            .zip(&self.weights)
            .map(|(info, &amount)| Asset::new(info.clone(), amount))
            .collect()
    }

    /// Map `(asset, amount)` pairs onto inventory order. Missing assets are zero.
    pub fn align(&self, amounts: &[Asset]) -> Result<Vec<u128>, ClusterError> {
        let mut aligned = vec![0u128; self.assets.len()];
        let mut seen = vec![false; self.assets.len()];
        for entry in amounts {
            let idx = self
                .position(&entry.info)
                .ok_or_else(|| ClusterError::InvalidInput(format!("{} is not in the cluster", entry.info)))?;
            if seen[idx] {
                return Err(ClusterError::InvalidInput(format!(
                    "{} listed more than once",
                    entry.info
                )));
            }
            seen[idx] = true;
            aligned[idx] = entry.amount;
        }
        Ok(aligned)
    }

    fn position(&self, info: &AssetInfo) -> Option<usize> {
        self.assets
            .iter()
            .position(|a| a.identifier() == info.identifier())
    }

    fn check_len(&self, amounts: &[u128]) -> Result<(), ClusterError> {
        if amounts.len() != self.assets.len() {
            return Err(ClusterError::InvalidInput(format!(
                "expected {} asset amounts, got {}",
                self.assets.len(),
                amounts.len()
            )));
        }
        Ok(())
    }

    /// Quotes for every asset, rejecting stale or non-positive prices.
    fn prices(&self, block: &BlockInfo, oracle: &dyn PricingOracle) -> Result<Vec<Rational>, ClusterError> {
        self.assets
            .iter()
            .map(|asset| {
                let quote = oracle.quote(asset)?;
                let age_secs = block.time.saturating_sub(quote.last_updated);
                if age_secs > self.stale_threshold_secs {
                    return Err(ClusterError::OracleStale {
                        asset: asset.to_string(),
                        age_secs,
                        threshold_secs: self.stale_threshold_secs,
                    });
                }
                if !quote.price.is_positive() {
                    return Err(ClusterError::InvalidInput(format!(
                        "price of {asset} must be positive, got {}",
                        quote.price
                    )));
                }
                Ok(quote.price)
            })
            .collect()
    }

    /// Mint cluster tokens against a deposit aligned with [`assets`](Self::assets).
    ///
    /// Returns the number of tokens minted.
    pub fn create(
        &mut self,
        block: BlockInfo,
        oracle: &dyn PricingOracle,
        amounts: &[u128],
        min_tokens: Option<u128>,
    ) -> Result<u128, ClusterError> {
        if !self.config.active {
            return Err(ClusterError::ClusterInactive);
        }
        self.check_len(amounts)?;
        let min_tokens = min_tokens.unwrap_or(0);
        if amounts.iter().all(|&a| a == 0) {
            if min_tokens > 0 {
                return Err(ClusterError::BelowMinimumMint { minted: 0, min_tokens });
            }
            return Ok(0);
        }

        let new_inventory = self
            .inventory
            .iter()
            .zip(amounts)
            .map(|(&i, &c)| i.checked_add(c))
            .collect::<Option<Vec<u128>>>()
            .ok_or_else(|| ClusterError::InvalidInput("inventory overflow".to_string()))?;

        let p = self.prices(&block, oracle)?;
        let c = to_rationals(amounts);
        let i0 = to_rationals(&self.inventory);
        let i1 = add(&i0, &c);
        let deposit_value = dot(&c, &p);

        let minted: Option<u128> = if self.supply == 0 {
            if let Some(idx) = (0..self.assets.len()).find(|&k| self.weights[k] > 0 && amounts[k] == 0) {
                return Err(ClusterError::InvalidInput(format!(
                    "initial mint requires a deposit of {}",
                    self.assets[idx]
                )));
            }
            deposit_value.floor_u128()
        } else {
            let w = to_rationals(&self.weights);
            let penalty = self.penalty.notional_penalty(block.height, &i0, &i1, &w, &p)?;
            let nav = dot(&i0, &p);
            let delta = &deposit_value + &penalty;
            debug!(cluster = %self.address, %deposit_value, %penalty, "scored create");
            (Rational::from(self.supply) * delta)
                .checked_div(&nav)
                .ok_or_else(|| ClusterError::InvalidInput("cluster notional is zero".to_string()))?
                .floor_u128()
        };
        let minted = minted.unwrap_or(0);

        if minted == 0 || minted < min_tokens {
            return Err(ClusterError::BelowMinimumMint {
                minted,
                min_tokens: min_tokens.max(1),
            });
        }
        let new_supply = self
            .supply
            .checked_add(minted)
            .ok_or_else(|| ClusterError::InvalidInput("supply overflow".to_string()))?;

        self.inventory = new_inventory;
        self.supply = new_supply;
        self.penalty.update_ema(block.height, &dot(&i1, &p));
        debug!(cluster = %self.address, minted, supply = self.supply, "create committed");
        Ok(minted)
    }

    /// [`create`](Self::create) with `(asset, amount)` pairs.
    pub fn create_assets(
        &mut self,
        block: BlockInfo,
        oracle: &dyn PricingOracle,
        amounts: &[Asset],
        min_tokens: Option<u128>,
    ) -> Result<u128, ClusterError> {
        let aligned = self.align(amounts)?;
        self.create(block, oracle, &aligned, min_tokens)
    }

    /// Burn cluster tokens for assets.
    ///
    /// Without `amounts`, burns exactly `max_tokens` for a pro-rata share of
    /// every asset. With `amounts`, pays out that basket and burns the
    /// penalty-adjusted cost, which must not exceed `max_tokens`. A basket
    /// equal to the whole inventory burns the whole supply.
    pub fn redeem(
        &mut self,
        block: BlockInfo,
        oracle: &dyn PricingOracle,
        max_tokens: u128,
        amounts: Option<&[u128]>,
    ) -> Result<Redemption, ClusterError> {
        if self.supply == 0 {
            return Err(ClusterError::InvalidInput(
                "cluster has no outstanding supply".to_string(),
            ));
        }
        if max_tokens == 0 {
            return Err(ClusterError::InvalidInput("max_tokens must be positive".to_string()));
        }
        match amounts {
            None => self.redeem_pro_rata(block, oracle, max_tokens),
            Some(r) => self.redeem_basket(block, oracle, max_tokens, r),
        }
    }

    fn redeem_pro_rata(
        &mut self,
        block: BlockInfo,
        oracle: &dyn PricingOracle,
        tokens: u128,
    ) -> Result<Redemption, ClusterError> {
        if tokens > self.supply {
            return Err(ClusterError::InvalidInput(format!(
                "cannot burn {tokens} of {} outstanding tokens",
                self.supply
            )));
        }
        let p = self.prices(&block, oracle)?;
        let share = Rational::from(tokens);
        let supply = Rational::from(self.supply);
        let payout = self
            .inventory
            .iter()
            .map(|&i| {
                (&share * Rational::from(i))
                    .checked_div(&supply)
                    .and_then(|x| x.floor_u128())
                    .ok_or_else(|| ClusterError::InvalidInput("pro-rata share out of range".to_string()))
            })
            .collect::<Result<Vec<u128>, ClusterError>>()?;

        self.commit_redeem(&block, &p, tokens, &payout);
        Ok(Redemption {
            burned: tokens,
            assets: payout,
        })
    }

    fn redeem_basket(
        &mut self,
        block: BlockInfo,
        oracle: &dyn PricingOracle,
        max_tokens: u128,
        r: &[u128],
    ) -> Result<Redemption, ClusterError> {
        self.check_len(r)?;
        if r.iter().all(|&x| x == 0) {
            return Err(ClusterError::InvalidInput("redemption basket is empty".to_string()));
        }
        for (k, (&have, &need)) in self.inventory.iter().zip(r).enumerate() {
            if need > have {
                return Err(ClusterError::InsufficientInventory {
                    asset: self.assets[k].to_string(),
                    have,
                    need,
                });
            }
        }

        let p = self.prices(&block, oracle)?;
        // Emptying the inventory retires every outstanding token.
        let drains_inventory = self.inventory.iter().zip(r).all(|(i, x)| i == x);
        let cost = if drains_inventory {
            self.supply
        } else {
            self.basket_cost(&block, &p, r)?
        };

        if cost > max_tokens {
            return Err(ClusterError::BelowMinimumRedeem { cost, max_tokens });
        }
        if !drains_inventory && cost >= self.supply {
            return Err(ClusterError::InvalidInput(format!(
                "redemption costs {cost} of {} outstanding tokens",
                self.supply
            )));
        }

        self.commit_redeem(&block, &p, cost, r);
        Ok(Redemption {
            burned: cost,
            assets: r.to_vec(),
        })
    }

    /// Tokens to burn for basket `r`, penalty included, rounded up.
    fn basket_cost(&self, block: &BlockInfo, p: &[Rational], r: &[u128]) -> Result<u128, ClusterError> {
        let w = to_rationals(&self.weights);
        let i0 = to_rationals(&self.inventory);
        let rr = to_rationals(r);
        let i1 = sub(&i0, &rr);
        let penalty = self.penalty.notional_penalty(block.height, &i0, &i1, &w, p)?;
        let nav = dot(&i0, p);
        let value = dot(&rr, p);
        debug!(cluster = %self.address, %value, %penalty, "scored redeem");

        let needed = (Rational::from(self.supply) * (&value - &penalty))
            .checked_div(&nav)
            .ok_or_else(|| ClusterError::InvalidInput("cluster notional is zero".to_string()))?;
        match needed.ceil_u128() {
            Some(cost) if cost > 0 => Ok(cost),
            _ => Err(ClusterError::InvalidInput(
                "redemption must burn at least one token".to_string(),
            )),
        }
    }

    fn commit_redeem(&mut self, block: &BlockInfo, p: &[Rational], burned: u128, payout: &[u128]) {
        for (i, &x) in self.inventory.iter_mut().zip(payout) {
            *i -= x;
        }
        self.supply -= burned;
        let nav = dot(&to_rationals(&self.inventory), p);
        self.penalty.update_ema(block.height, &nav);
        debug!(cluster = %self.address, burned, supply = self.supply, "redeem committed");
    }

    /// [`redeem`](Self::redeem) with an optional `(asset, amount)` basket.
    pub fn redeem_assets(
        &mut self,
        block: BlockInfo,
        oracle: &dyn PricingOracle,
        max_tokens: u128,
        amounts: Option<&[Asset]>,
    ) -> Result<Redemption, ClusterError> {
        let aligned = amounts.map(|a| self.align(a)).transpose()?;
        self.redeem(block, oracle, max_tokens, aligned.as_deref())
    }

    fn require_owner(&self, sender: &str) -> Result<(), ClusterError> {
        if sender != self.config.owner {
            return Err(ClusterError::Unauthorized(format!(
                "{sender} is not the cluster owner"
            )));
        }
        Ok(())
    }

    /// Replace the composition reference. Inventory is not touched.
    ///
    /// Held assets missing from `target` stay with weight zero so they can
    /// still be redeemed; missing assets with no inventory are dropped.
    pub fn update_target(&mut self, sender: &str, target: Target) -> Result<(), ClusterError> {
        if sender != self.config.owner && sender != self.config.target_oracle {
            return Err(ClusterError::Unauthorized(format!(
                "{sender} may not update the target"
            )));
        }
        target.validate()?;

        let mut assets = Vec::with_capacity(target.len());
        let mut weights = Vec::with_capacity(target.len());
        let mut inventory = Vec::with_capacity(target.len());
        for entry in target.entries() {
            let held = self.position(&entry.info).map_or(0, |k| self.inventory[k]);
            assets.push(entry.info.clone());
            weights.push(entry.amount);
            inventory.push(held);
        }
        for (k, info) in self.assets.iter().enumerate() {
            if self.inventory[k] > 0 && target.position(info).is_none() {
                assets.push(info.clone());
                weights.push(0);
                inventory.push(self.inventory[k]);
            }
        }

        self.assets = assets;
        self.weights = weights;
        self.inventory = inventory;
        debug!(cluster = %self.address, assets = self.assets.len(), "target updated");
        Ok(())
    }

    /// Disable minting permanently. Redemption stays open.
    pub fn decommission(&mut self, sender: &str) -> Result<(), ClusterError> {
        self.require_owner(sender)?;
        if !self.config.active {
            return Err(ClusterError::ClusterInactive);
        }
        self.config.active = false;
        debug!(cluster = %self.address, "decommissioned");
        Ok(())
    }

    /// Swap in a new penalty model hosted at `penalty_address`.
    pub fn reset_penalty(
        &mut self,
        sender: &str,
        penalty_address: impl Into<String>,
        penalty: Box<dyn PenaltyCalculator>,
    ) -> Result<(), ClusterError> {
        self.require_owner(sender)?;
        self.config.penalty = penalty_address.into();
        self.penalty = penalty;
        Ok(())
    }

    /// Snapshot priced with the oracle's latest quotes, stale or not.
    pub fn state(&self, oracle: &dyn PricingOracle) -> Result<ClusterStateResponse, ClusterError> {
        let prices = self
            .assets
            .iter()
            .map(|a| oracle.quote(a).map(|q| q.price))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ClusterStateResponse {
            outstanding_balance_tokens: self.supply,
            prices,
            inv: self.inventory.clone(),
            assets: self.assets.clone(),
            penalty: self.config.penalty.clone(),
            cluster_token: self.config.cluster_token.clone(),
            target: self.target_entries(),
            cluster_contract_address: self.address.clone(),
            active: self.config.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::StaticOracle;
    use nimbus_core::types::PenaltyParams;
    use nimbus_penalty::PenaltyModel;
    use proptest::prelude::*;

    const OWNER: &str = "terra1owner";
    const BOT: &str = "terra1bot";
    const T0: u64 = 1_640_000_000;

    fn a() -> AssetInfo {
        AssetInfo::native("uluna")
    }

    fn b() -> AssetInfo {
        AssetInfo::token("terra1mir")
    }

    fn config() -> ClusterConfig {
        ClusterConfig {
            name: "Test".into(),
            symbol: "TST".into(),
            description: "test cluster".into(),
            owner: OWNER.into(),
            cluster_token: Some("terra1token".into()),
            factory: "terra1factory".into(),
            pricing_oracle: "terra1oracle".into(),
            target_oracle: BOT.into(),
            penalty: "terra1penalty".into(),
            active: true,
        }
    }

    fn engine() -> ClusterEngine {
        let target = Target::new(vec![Asset::new(a(), 1), Asset::new(b(), 1)]).unwrap();
        let penalty = Box::new(PenaltyModel::new(PenaltyParams::default()).unwrap());
        ClusterEngine::new("terra1cluster", config(), target, penalty).unwrap()
    }

    fn oracle() -> StaticOracle {
        StaticOracle::new()
            .with_price(&a(), Rational::one(), T0)
            .with_price(&b(), Rational::one(), T0)
    }

    fn block(height: u64) -> BlockInfo {
        BlockInfo {
            height,
            time: T0 + height * 6,
        }
    }

    fn seeded() -> ClusterEngine {
        let mut e = engine();
        e.create(block(1), &oracle(), &[1_000_000, 1_000_000], Some(1_999_000))
            .unwrap();
        e
    }

    // --- create ---

    #[test]
    fn initial_mint_is_deposit_value() {
        let e = seeded();
        assert_eq!(e.supply(), 2_000_000);
        assert_eq!(e.inventory(), &[1_000_000, 1_000_000]);
        assert_eq!(e.penalty().last_block(), 1);
    }

    #[test]
    fn initial_mint_requires_every_weighted_asset() {
        let mut e = engine();
        let err = e.create(block(1), &oracle(), &[1_000, 0], None).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
        assert_eq!(e.supply(), 0);
    }

    #[test]
    fn balanced_mint_has_no_adjustment() {
        let mut e = seeded();
        assert_eq!(e.create(block(2), &oracle(), &[100, 100], None).unwrap(), 200);
        assert_eq!(e.supply(), 2_000_200);
    }

    #[test]
    fn zero_deposit_is_a_no_op() {
        let mut e = seeded();
        assert_eq!(e.create(block(2), &oracle(), &[0, 0], None).unwrap(), 0);
        assert_eq!(e.supply(), 2_000_000);
        assert_eq!(e.penalty().last_block(), 1);
    }

    #[test]
    fn zero_deposit_still_honors_guard() {
        let mut e = seeded();
        let err = e.create(block(2), &oracle(), &[0, 0], Some(5)).unwrap_err();
        assert!(matches!(err, ClusterError::BelowMinimumMint { minted: 0, .. }));
    }

    #[test]
    fn min_tokens_guard() {
        let mut e = seeded();
        let err = e.create(block(2), &oracle(), &[1_000, 0], Some(1_000)).unwrap_err();
        assert_eq!(
            err,
            ClusterError::BelowMinimumMint {
                minted: 900,
                min_tokens: 1_000
            }
        );
        assert_eq!(e.inventory(), &[1_000_000, 1_000_000]);
    }

    #[test]
    fn dust_deposit_minting_nothing_is_rejected() {
        let mut e = seeded();
        let err = e.create(block(2), &oracle(), &[1, 0], None).unwrap_err();
        assert!(matches!(err, ClusterError::BelowMinimumMint { minted: 0, .. }));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut e = seeded();
        let err = e.create(block(2), &oracle(), &[1], None).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }

    #[test]
    fn imbalance_ceiling_rejects_large_one_sided_deposit() {
        let mut e = seeded();
        let err = e.create(block(2), &oracle(), &[1_000_000, 0], None).unwrap_err();
        assert!(matches!(err, ClusterError::ClusterImbalanceTooHigh { .. }));
        assert_eq!(e.supply(), 2_000_000);
    }

    #[test]
    fn create_assets_aligns_by_identifier() {
        let mut e = seeded();
        let minted = e
            .create_assets(
                block(2),
                &oracle(),
                &[Asset::new(b(), 100), Asset::new(a(), 100)],
                None,
            )
            .unwrap();
        assert_eq!(minted, 200);
    }

    #[test]
    fn align_rejects_unknown_and_duplicate() {
        let e = seeded();
        assert!(e.align(&[Asset::new(AssetInfo::native("ukrw"), 1)]).is_err());
        assert!(e.align(&[Asset::new(a(), 1), Asset::new(a(), 2)]).is_err());
        assert_eq!(e.align(&[Asset::new(b(), 7)]).unwrap(), vec![0, 7]);
    }

    // --- oracle ---

    #[test]
    fn stale_price_rejected() {
        let mut e = engine().with_stale_threshold(60);
        let late = BlockInfo {
            height: 1,
            time: T0 + 61,
        };
        let err = e.create(late, &oracle(), &[1, 1], None).unwrap_err();
        assert!(matches!(err, ClusterError::OracleStale { age_secs: 61, threshold_secs: 60, .. }));
    }

    #[test]
    fn missing_price_rejected() {
        let mut e = engine();
        let partial = StaticOracle::new().with_price(&a(), Rational::one(), T0);
        assert!(e.create(block(1), &partial, &[1, 1], None).is_err());
    }

    #[test]
    fn zero_price_rejected() {
        let mut e = engine();
        let zero = oracle().with_price(&b(), Rational::zero(), T0);
        let err = e.create(block(1), &zero, &[1, 1], None).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }

    // --- redeem ---

    #[test]
    fn pro_rata_redeem() {
        let mut e = seeded();
        let out = e.redeem(block(2), &oracle(), 1_000, None).unwrap();
        assert_eq!(out.assets, vec![500, 500]);
        assert_eq!(out.burned, 1_000);
        assert_eq!(e.inventory(), &[999_500, 999_500]);
        assert_eq!(e.supply(), 1_999_000);
    }

    #[test]
    fn full_pro_rata_redeem_empties_cluster() {
        let mut e = seeded();
        let out = e.redeem(block(2), &oracle(), 2_000_000, None).unwrap();
        assert_eq!(out.assets, vec![1_000_000, 1_000_000]);
        assert_eq!(e.supply(), 0);
        assert_eq!(e.inventory(), &[0, 0]);
    }

    #[test]
    fn pro_rata_beyond_supply_rejected() {
        let mut e = seeded();
        let err = e.redeem(block(2), &oracle(), 2_000_001, None).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }

    #[test]
    fn redeem_from_empty_cluster_rejected() {
        let mut e = engine();
        assert!(e.redeem(block(1), &oracle(), 1, None).is_err());
    }

    #[test]
    fn basket_redeem_over_max_tokens() {
        let mut e = seeded();
        let err = e
            .redeem(block(2), &oracle(), 1, Some(&[100_000, 0][..]))
            .unwrap_err();
        assert_eq!(
            err,
            ClusterError::BelowMinimumRedeem {
                cost: 117_112,
                max_tokens: 1
            }
        );
        assert_eq!(e.supply(), 2_000_000);
    }

    #[test]
    fn basket_redeem_pays_penalty() {
        let mut e = seeded();
        let out = e
            .redeem(block(2), &oracle(), 200_000, Some(&[100_000, 0][..]))
            .unwrap();
        assert_eq!(out.burned, 117_112);
        assert_eq!(e.inventory(), &[900_000, 1_000_000]);
        assert_eq!(e.supply(), 2_000_000 - 117_112);
    }

    #[test]
    fn balanced_basket_costs_its_value() {
        let mut e = seeded();
        let out = e.redeem(block(2), &oracle(), 1_000, Some(&[500, 500][..])).unwrap();
        assert_eq!(out.burned, 1_000);
    }

    #[test]
    fn basket_exceeding_inventory() {
        let mut e = seeded();
        let err = e
            .redeem(block(2), &oracle(), u128::MAX, Some(&[1_000_001, 0][..]))
            .unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientInventory { need: 1_000_001, .. }));
    }

    #[test]
    fn draining_basket_burns_whole_supply() {
        let mut e = seeded();
        e.redeem(block(2), &oracle(), 200_000, Some(&[100_000, 0][..]))
            .unwrap();
        let supply = e.supply();

        let out = e
            .redeem(block(3), &oracle(), supply, Some(&[900_000, 1_000_000][..]))
            .unwrap();
        assert_eq!(out.burned, supply);
        assert_eq!(e.supply(), 0);
        assert_eq!(e.inventory(), &[0, 0]);

        // The cluster starts over from an empty inventory.
        assert_eq!(e.create(block(4), &oracle(), &[10, 10], None).unwrap(), 20);
    }

    #[test]
    fn draining_basket_needs_whole_supply_allowance() {
        let mut e = seeded();
        let err = e
            .redeem(block(2), &oracle(), 1_999_999, Some(&[1_000_000, 1_000_000][..]))
            .unwrap_err();
        assert_eq!(
            err,
            ClusterError::BelowMinimumRedeem {
                cost: 2_000_000,
                max_tokens: 1_999_999
            }
        );
        assert_eq!(e.inventory(), &[1_000_000, 1_000_000]);
    }

    #[test]
    fn redeem_allowed_after_decommission() {
        let mut e = seeded();
        e.decommission(OWNER).unwrap();
        assert!(!e.is_active());
        let err = e.create(block(2), &oracle(), &[1, 1], None).unwrap_err();
        assert_eq!(err, ClusterError::ClusterInactive);
        assert!(e.redeem(block(3), &oracle(), 10, None).is_ok());
    }

    // --- governance ---

    #[test]
    fn decommission_is_owner_only_and_terminal() {
        let mut e = seeded();
        assert!(matches!(e.decommission(BOT), Err(ClusterError::Unauthorized(_))));
        e.decommission(OWNER).unwrap();
        assert_eq!(e.decommission(OWNER), Err(ClusterError::ClusterInactive));
    }

    #[test]
    fn update_target_by_bot() {
        let mut e = seeded();
        let c = AssetInfo::native("ukrw");
        let target = Target::new(vec![Asset::new(a(), 2), Asset::new(c.clone(), 3)]).unwrap();
        e.update_target(BOT, target).unwrap();
        // b is still held, so it stays with zero weight
        assert_eq!(e.assets(), &[a(), c, b()]);
        assert_eq!(e.weights(), &[2, 3, 0]);
        assert_eq!(e.inventory(), &[1_000_000, 0, 1_000_000]);
        assert_eq!(e.supply(), 2_000_000);
    }

    #[test]
    fn update_target_drops_empty_assets() {
        let mut e = engine();
        let target = Target::new(vec![Asset::new(a(), 1)]).unwrap();
        e.update_target(OWNER, target).unwrap();
        assert_eq!(e.assets(), &[a()]);
    }

    #[test]
    fn update_target_unauthorized() {
        let mut e = seeded();
        let target = Target::new(vec![Asset::new(a(), 1)]).unwrap();
        assert!(matches!(
            e.update_target("terra1stranger", target),
            Err(ClusterError::Unauthorized(_))
        ));
    }

    #[test]
    fn reset_penalty_replaces_model() {
        let mut e = seeded();
        let fresh = Box::new(PenaltyModel::new(PenaltyParams::default()).unwrap());
        assert!(e.reset_penalty(BOT, "terra1p2", fresh.clone()).is_err());
        e.reset_penalty(OWNER, "terra1p2", fresh).unwrap();
        assert_eq!(e.config().penalty, "terra1p2");
        assert_eq!(e.penalty().last_block(), 0);
    }

    #[test]
    fn state_snapshot() {
        let e = seeded();
        let state = e.state(&oracle()).unwrap();
        assert_eq!(state.outstanding_balance_tokens, 2_000_000);
        assert_eq!(state.inv, vec![1_000_000, 1_000_000]);
        assert_eq!(state.notional(), Rational::from(2_000_000u64));
        assert_eq!(state.cluster_contract_address, "terra1cluster");
        assert!(state.active);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn pro_rata_conserves_supply(x in 1u128..=2_000_000) {
            let mut e = seeded();
            let out = e.redeem(block(2), &oracle(), x, None).unwrap();
            prop_assert_eq!(e.supply() + out.burned, 2_000_000);
            for (k, &paid) in out.assets.iter().enumerate() {
                prop_assert_eq!(paid, x * 1_000_000 / 2_000_000);
                prop_assert_eq!(e.inventory()[k] + paid, 1_000_000);
            }
        }

        #[test]
        fn aligned_round_trip(k in 1u128..1_000) {
            let mut e = seeded();
            let minted = e.create(block(2), &oracle(), &[k, k], None).unwrap();
            prop_assert_eq!(minted, 2 * k);
            let out = e.redeem(block(3), &oracle(), minted, None).unwrap();
            prop_assert_eq!(out.assets, vec![k, k]);
        }

        #[test]
        fn failed_operations_leave_state(deposit in 0u128..3_000_000, burn in 0u128..3_000_000) {
            let mut e = seeded();
            let before = (e.inventory().to_vec(), e.supply(), e.penalty().last_block());
            if e.create(block(2), &oracle(), &[deposit, 0], None).is_err() {
                prop_assert_eq!(&before, &(e.inventory().to_vec(), e.supply(), e.penalty().last_block()));
            }
            let before = (e.inventory().to_vec(), e.supply(), e.penalty().last_block());
            if e.redeem(block(3), &oracle(), burn, Some(&[burn, 0][..])).is_err() {
                prop_assert_eq!(&before, &(e.inventory().to_vec(), e.supply(), e.penalty().last_block()));
            }
        }
    }
}
