//! Typed helpers for the factory, cluster, and oracle contracts.
//!
//! Each helper shapes the JSON envelope, submits it through any
//! [`BlockchainClient`], and decodes the reply.

use std::collections::BTreeMap;

use nimbus_core::error::{ExternalError, NimbusError};
use nimbus_core::msg::{
    ClusterConfig, ClusterConfigResponse, ClusterExecuteMsg, ClusterParams, ClusterQueryMsg,
    ClusterStateResponse, FactoryExecuteMsg, OracleExecuteMsg, PriceEntry, TargetResponse,
};
use nimbus_core::traits::BlockchainClient;
use nimbus_core::types::{Asset, Coin, Target, TxResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Addresses emitted by the factory for a new cluster.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreatedCluster {
    pub cluster: String,
    pub token: Option<String>,
}

async fn exec<C, M>(client: &C, contract: &str, msg: &M, funds: &[Coin]) -> Result<TxResult, NimbusError>
where
    C: BlockchainClient + ?Sized,
    M: Serialize,
{
    let msg = serde_json::to_value(msg)?;
    client.execute(contract, &msg, funds).await
}

async fn query<C, Q, R>(client: &C, contract: &str, q: &Q) -> Result<R, NimbusError>
where
    C: BlockchainClient + ?Sized,
    Q: Serialize,
    R: DeserializeOwned,
{
    let q = serde_json::to_value(q)?;
    let reply: Value = client.query(contract, &q).await?;
    serde_json::from_value(reply)
        .map_err(|e| ExternalError::Decode(format!("{contract}: {e}")).into())
}

pub async fn create_cluster<C>(
    client: &C,
    factory: &str,
    params: ClusterParams,
) -> Result<CreatedCluster, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let symbol = params.symbol.clone();
    let tx = exec(client, factory, &FactoryExecuteMsg::CreateCluster { params }, &[]).await?;
    let cluster = tx
        .attribute("cluster_addr")
        .ok_or_else(|| ExternalError::Decode(format!("tx {} emitted no cluster_addr", tx.txhash)))?
        .to_string();
    let token = tx.attribute("cluster_token_addr").map(str::to_string);
    info!(%symbol, %cluster, "created cluster");
    Ok(CreatedCluster { cluster, token })
}

pub async fn update_target<C>(client: &C, cluster: &str, target: &Target) -> Result<TxResult, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let msg = ClusterExecuteMsg::UpdateTarget {
        target: target.clone(),
    };
    exec(client, cluster, &msg, &[]).await
}

/// Funds bag covering the native-token part of a deposit.
///
/// Amounts of the same denom are merged; zero amounts are left out.
pub fn native_funds(assets: &[Asset]) -> Vec<Coin> {
    let mut bag: BTreeMap<&str, u128> = BTreeMap::new();
    for asset in assets.iter().filter(|a| a.info.is_native() && a.amount > 0) {
        *bag.entry(asset.info.identifier()).or_default() += asset.amount;
    }
    bag.into_iter()
        .map(|(denom, amount)| Coin {
            denom: denom.to_string(),
            amount,
        })
        .collect()
}

pub async fn rebalance_create<C>(
    client: &C,
    cluster: &str,
    assets: &[Asset],
    min_tokens: Option<u128>,
) -> Result<TxResult, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let msg = ClusterExecuteMsg::RebalanceCreate {
        asset_amounts: assets.to_vec(),
        min_tokens,
    };
    exec(client, cluster, &msg, &native_funds(assets)).await
}

/// Redeem pro-rata when `assets` is `None`, otherwise the given basket.
pub async fn rebalance_redeem<C>(
    client: &C,
    cluster: &str,
    max_tokens: u128,
    assets: Option<&[Asset]>,
) -> Result<TxResult, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let msg = ClusterExecuteMsg::RebalanceRedeem {
        max_tokens,
        asset_amounts: assets.map(<[Asset]>::to_vec),
    };
    exec(client, cluster, &msg, &[]).await
}

pub async fn decommission<C>(client: &C, cluster: &str) -> Result<TxResult, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    exec(client, cluster, &ClusterExecuteMsg::Decommission {}, &[]).await
}

pub async fn feed_prices<C>(client: &C, oracle: &str, prices: &[PriceEntry]) -> Result<TxResult, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let msg = OracleExecuteMsg::FeedPrices {
        prices: prices.to_vec(),
    };
    exec(client, oracle, &msg, &[]).await
}

pub async fn query_cluster_state<C>(client: &C, cluster: &str) -> Result<ClusterStateResponse, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let q = ClusterQueryMsg::ClusterState {
        cluster_contract_address: cluster.to_string(),
    };
    query(client, cluster, &q).await
}

pub async fn query_target<C>(client: &C, cluster: &str) -> Result<Vec<Asset>, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let resp: TargetResponse = query(client, cluster, &ClusterQueryMsg::Target {}).await?;
    Ok(resp.target)
}

pub async fn query_config<C>(client: &C, cluster: &str) -> Result<ClusterConfig, NimbusError>
where
    C: BlockchainClient + ?Sized,
{
    let resp: ClusterConfigResponse = query(client, cluster, &ClusterQueryMsg::Config {}).await?;
    Ok(resp.config)
}
