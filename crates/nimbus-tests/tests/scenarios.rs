//! Worked create/redeem examples on an equal-weight two-asset cluster with
//! unit prices and default penalty parameters.

use nimbus_core::error::ClusterError;
use nimbus_core::math::{imbalance, to_rationals};
use nimbus_core::Rational;
use nimbus_tests::helpers::*;

fn imbalance_of(inventory: &[u128]) -> Rational {
    imbalance(
        &to_rationals(inventory),
        &to_rationals(&[1, 1]),
        &to_rationals(&[1, 1]),
    )
    .unwrap()
}

#[test]
fn initial_mint_equals_deposit_value() {
    let mut engine = pair_engine(1, 1);
    let minted = engine
        .create(block(1), &unit_oracle(), &[1_000_000, 1_000_000], Some(1_999_000))
        .unwrap();

    assert_eq!(minted, 2_000_000);
    assert_eq!(engine.inventory(), &[1_000_000, 1_000_000]);
    assert_eq!(engine.supply(), 2_000_000);
}

#[test]
fn balanced_mint_is_neither_penalized_nor_rewarded() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    let minted = engine
        .create(block(2), &unit_oracle(), &[100, 100], None)
        .unwrap();

    assert_eq!(minted, 200);
    assert_eq!(engine.inventory(), &[1_000_100, 1_000_100]);
    assert_eq!(engine.supply(), 2_000_200);
}

#[test]
fn imbalancing_mint_pays_penalty() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    let before = imbalance_of(engine.inventory());
    let minted = engine
        .create(block(2), &unit_oracle(), &[1_000, 0], None)
        .unwrap();

    assert!(minted < 1_000);
    assert_eq!(minted, 900);
    assert!(imbalance_of(engine.inventory()) > before);
    assert_eq!(engine.supply(), 2_000_900);
}

#[test]
fn rebalancing_mint_earns_reward() {
    let mut engine = seeded([900_000, 1_100_000]);
    assert_eq!(engine.supply(), 2_000_000);
    let before = imbalance_of(engine.inventory());

    let minted = engine
        .create(block(2), &unit_oracle(), &[100_000, 0], None)
        .unwrap();

    assert!(minted > 100_000);
    assert_eq!(minted, 105_000);
    assert!(imbalance_of(engine.inventory()) < before);
}

#[test]
fn pro_rata_redeem_returns_share_of_inventory() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    let out = engine.redeem(block(2), &unit_oracle(), 1_000, None).unwrap();

    assert_eq!(out.assets, vec![500, 500]);
    assert_eq!(out.burned, 1_000);
    assert_eq!(engine.inventory(), &[999_500, 999_500]);
    assert_eq!(engine.supply(), 1_999_000);
}

#[test]
fn basket_redeem_above_max_tokens_is_rejected() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    let last_block = engine.penalty().last_block();
    let ema = engine.penalty().ema().clone();

    let err = engine
        .redeem(block(2), &unit_oracle(), 1, Some(&[100_000, 0][..]))
        .unwrap_err();

    assert!(matches!(
        err,
        ClusterError::BelowMinimumRedeem { max_tokens: 1, .. }
    ));
    assert_eq!(
        err,
        ClusterError::BelowMinimumRedeem {
            cost: 117_112,
            max_tokens: 1
        }
    );
    assert_eq!(engine.inventory(), &[1_000_000, 1_000_000]);
    assert_eq!(engine.supply(), 2_000_000);
    assert_eq!(engine.penalty().last_block(), last_block);
    assert_eq!(engine.penalty().ema(), &ema);
}

#[test]
fn min_tokens_guard_rejects_penalized_mint() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    let err = engine
        .create(block(2), &unit_oracle(), &[1_000, 0], Some(1_000))
        .unwrap_err();

    assert_eq!(
        err,
        ClusterError::BelowMinimumMint {
            minted: 900,
            min_tokens: 1_000
        }
    );
    assert_eq!(engine.supply(), 2_000_000);
}

#[test]
fn one_sided_deposit_past_ceiling_is_rejected() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    let err = engine
        .create(block(2), &unit_oracle(), &[1_000_000, 0], None)
        .unwrap_err();

    assert!(matches!(err, ClusterError::ClusterImbalanceTooHigh { .. }));
    assert_eq!(engine.inventory(), &[1_000_000, 1_000_000]);
}

#[test]
fn stale_oracle_blocks_create_and_redeem() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    // Prices were quoted at T0; block 1_000 is well past the threshold.
    let late = block(1_000);

    let err = engine
        .create(late, &unit_oracle(), &[100, 100], None)
        .unwrap_err();
    assert!(matches!(err, ClusterError::OracleStale { .. }));

    let err = engine
        .redeem(late, &unit_oracle(), 100, Some(&[50, 50][..]))
        .unwrap_err();
    assert!(matches!(err, ClusterError::OracleStale { .. }));
    assert_eq!(engine.supply(), 2_000_000);
}

#[test]
fn decommissioned_cluster_only_redeems() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    engine.decommission(OWNER).unwrap();

    let err = engine
        .create(block(2), &unit_oracle(), &[100, 100], None)
        .unwrap_err();
    assert_eq!(err, ClusterError::ClusterInactive);

    let out = engine.redeem(block(3), &unit_oracle(), 2_000, None).unwrap();
    assert_eq!(out.assets, vec![1_000, 1_000]);
    assert_eq!(engine.decommission(OWNER).unwrap_err(), ClusterError::ClusterInactive);
}

#[test]
fn retarget_then_mint_at_new_weights() {
    let mut engine = seeded([1_000_000, 1_000_000]);
    engine.update_target(BOT, pair_target(3, 1)).unwrap();
    assert_eq!(engine.weights(), &[3, 1]);

    // Moving towards the new 3:1 target is rewarded.
    let minted = engine
        .create(block(2), &unit_oracle(), &[100_000, 0], None)
        .unwrap();
    assert!(minted > 100_000);
}
