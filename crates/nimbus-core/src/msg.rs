//! CosmWasm message envelopes for the factory, cluster, penalty, and oracle
//! contracts.
//!
//! Each enum serializes to a single-key object naming the operation, e.g.
//! `{"update_target": {"target": [..]}}`. Field names are wire contracts.

use serde::{Deserialize, Serialize};

use crate::decimal::Rational;
use crate::types::{Asset, AssetInfo, PenaltyParams, Target, opt_uint128, uint128, uint128_vec};

/// Parameters of a new cluster, as submitted to the factory.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClusterParams {
    pub name: String,
    pub symbol: String,
    pub description: String,
    /// Address of the penalty contract.
    pub penalty: String,
    pub target: Target,
    pub pricing_oracle: String,
    pub target_oracle: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FactoryInstantiateMsg {
    pub owner: String,
    pub token_code_id: u64,
    pub cluster_code_id: u64,
    pub base_denom: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FactoryExecuteMsg {
    CreateCluster { params: ClusterParams },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterExecuteMsg {
    UpdateTarget {
        target: Target,
    },
    RebalanceCreate {
        asset_amounts: Vec<Asset>,
        #[serde(default, with = "opt_uint128", skip_serializing_if = "Option::is_none")]
        min_tokens: Option<u128>,
    },
    RebalanceRedeem {
        #[serde(with = "uint128")]
        max_tokens: u128,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        asset_amounts: Option<Vec<Asset>>,
    },
    Decommission {},
    /// Replace the penalty contract wholesale.
    ResetPenalty {
        penalty: String,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterQueryMsg {
    ClusterState { cluster_contract_address: String },
    Config {},
    Target {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PenaltyInstantiateMsg {
    pub owner: String,
    pub penalty_params: PenaltyParams,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyQueryMsg {
    Params {},
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PenaltyParamsResponse {
    pub penalty_params: PenaltyParams,
    pub ema: Rational,
    pub last_block: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OracleInstantiateMsg {
    pub owner: String,
    pub base_denom: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PriceEntry {
    pub info: AssetInfo,
    pub price: Rational,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OracleExecuteMsg {
    FeedPrices { prices: Vec<PriceEntry> },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OracleQueryMsg {
    Price { asset: AssetInfo },
}

/// Static configuration of one cluster.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClusterConfig {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub owner: String,
    pub cluster_token: Option<String>,
    pub factory: String,
    pub pricing_oracle: String,
    pub target_oracle: String,
    pub penalty: String,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClusterConfigResponse {
    pub config: ClusterConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TargetResponse {
    pub target: Vec<Asset>,
}

/// Snapshot of a cluster's economic state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClusterStateResponse {
    #[serde(with = "uint128")]
    pub outstanding_balance_tokens: u128,
    pub prices: Vec<Rational>,
    #[serde(with = "uint128_vec")]
    pub inv: Vec<u128>,
    pub assets: Vec<AssetInfo>,
    pub penalty: String,
    pub cluster_token: Option<String>,
    pub target: Vec<Asset>,
    pub cluster_contract_address: String,
    pub active: bool,
}

impl ClusterStateResponse {
    /// `Σ inv_k · price_k`.
    pub fn notional(&self) -> Rational {
        self.inv
            .iter()
            .zip(&self.prices)
            .map(|(&i, p)| Rational::from(i) * p)
            .sum()
    }
}
