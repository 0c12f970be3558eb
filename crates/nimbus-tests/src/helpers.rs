//! Shared builders for the integration tests.

use std::collections::BTreeMap;
use std::path::Path;

use nimbus_chain::deploy::{CONTRACTS, ChainArtifacts, DeployPlan, Deployer};
use nimbus_cluster::{ClusterEngine, Simulator, StaticOracle};
use nimbus_core::constants::{BLOCK_TIME_SECS, DEFAULT_ORACLE_STALE_THRESHOLD_SECS, EMA_TAU_BLOCKS};
use nimbus_core::msg::ClusterConfig;
use nimbus_core::types::{Asset, AssetInfo, BlockInfo, PenaltyParams, Target};
use nimbus_core::Rational;
use nimbus_penalty::PenaltyModel;
use serde_json::json;

pub const OWNER: &str = "terra1owner";
pub const BOT: &str = "terra1bot";
pub const T0: u64 = 1_640_000_000;
pub const CHAIN_ID: &str = "localterra";

pub fn luna() -> AssetInfo {
    AssetInfo::native("uluna")
}

pub fn mir() -> AssetInfo {
    AssetInfo::token("terra1mir")
}

/// Block `height`, one block time apart from `T0`.
pub fn block(height: u64) -> BlockInfo {
    BlockInfo {
        height,
        time: T0 + height * BLOCK_TIME_SECS,
    }
}

pub fn config() -> ClusterConfig {
    ClusterConfig {
        name: "Pair".into(),
        symbol: "PAIR".into(),
        description: "two-asset test cluster".into(),
        owner: OWNER.into(),
        cluster_token: Some("terra1token".into()),
        factory: "terra1factory".into(),
        pricing_oracle: "terra1oracle".into(),
        target_oracle: BOT.into(),
        penalty: "terra1penalty".into(),
        active: true,
    }
}

pub fn pair_target(w_luna: u128, w_mir: u128) -> Target {
    Target::new(vec![Asset::new(luna(), w_luna), Asset::new(mir(), w_mir)]).unwrap()
}

/// Engine over `[luna, mir]` with default penalty parameters.
pub fn pair_engine(w_luna: u128, w_mir: u128) -> ClusterEngine {
    let penalty =
        PenaltyModel::with_tau(PenaltyParams::default(), EMA_TAU_BLOCKS).unwrap();
    ClusterEngine::new("terra1cluster", config(), pair_target(w_luna, w_mir), Box::new(penalty))
        .unwrap()
        .with_stale_threshold(DEFAULT_ORACLE_STALE_THRESHOLD_SECS)
}

/// Oracle pricing both assets as of `time`.
pub fn oracle_at(p_luna: Rational, p_mir: Rational, time: u64) -> StaticOracle {
    StaticOracle::new()
        .with_price(&luna(), p_luna, time)
        .with_price(&mir(), p_mir, time)
}

pub fn unit_oracle() -> StaticOracle {
    oracle_at(Rational::one(), Rational::one(), T0)
}

/// Equal-weight engine seeded at block 1 with `inventory`.
pub fn seeded(inventory: [u128; 2]) -> ClusterEngine {
    let mut engine = pair_engine(1, 1);
    engine
        .create(block(1), &unit_oracle(), &inventory, None)
        .unwrap();
    engine
}

/// Stand-in bytecode for every contract the deployer uploads.
pub fn wasm_bundle() -> BTreeMap<String, Vec<u8>> {
    CONTRACTS
        .iter()
        .map(|name| (name.to_string(), format!("\0asm{name}").into_bytes()))
        .collect()
}

/// Plan for one equal-weight `[luna, mir]` cluster named `PAIR`, both
/// assets priced at one.
pub fn pair_plan() -> DeployPlan {
    serde_json::from_value(json!({
        "owner": OWNER,
        "clusters": [{
            "name": "Pair",
            "symbol": "PAIR",
            "target": [
                {"info": luna(), "amount": "1"},
                {"info": mir(), "amount": "1"}
            ]
        }],
        "initial_prices": [
            {"info": luna(), "price": "1"},
            {"info": mir(), "price": "1"}
        ]
    }))
    .unwrap()
}

/// Deploy [`pair_plan`] onto `sim`, recording artifacts at `path`.
pub async fn deploy_pair(sim: &Simulator, path: &Path) -> ChainArtifacts {
    Deployer::new(sim, CHAIN_ID, path)
        .unwrap()
        .run(&wasm_bundle(), &pair_plan())
        .await
        .unwrap()
}
