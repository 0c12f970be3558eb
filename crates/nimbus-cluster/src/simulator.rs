//! In-memory chain that hosts oracle, penalty, factory, and cluster
//! contracts behind the [`BlockchainClient`] contract.
//!
//! Contract kinds are recognised from the shape of their instantiate
//! message. Every upload, instantiate, and execute lands in its own block.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nimbus_core::constants::{
    BLOCK_TIME_SECS, DEFAULT_ORACLE_STALE_THRESHOLD_SECS, EMA_TAU_BLOCKS,
};
use nimbus_core::error::{ClusterError, NimbusError};
use nimbus_core::msg::{
    ClusterConfig, ClusterConfigResponse, ClusterExecuteMsg, ClusterQueryMsg, ClusterStateResponse,
    FactoryExecuteMsg, FactoryInstantiateMsg, OracleExecuteMsg, OracleInstantiateMsg,
    OracleQueryMsg, PenaltyInstantiateMsg, PenaltyParamsResponse, PenaltyQueryMsg, PriceEntry,
    TargetResponse,
};
use nimbus_core::traits::{BlockchainClient, PricingOracle};
use nimbus_core::types::{Attribute, BlockInfo, Coin, PenaltyParams, TxResult, uint128};
use nimbus_core::Rational;
use nimbus_penalty::PenaltyModel;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::engine::ClusterEngine;
use crate::oracle::StaticOracle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimOptions {
    /// Unix time of block 1.
    pub genesis_time: u64,
    pub oracle_stale_threshold_secs: u64,
    pub ema_tau_blocks: i64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            genesis_time: 1_640_995_200,
            oracle_stale_threshold_secs: DEFAULT_ORACLE_STALE_THRESHOLD_SECS,
            ema_tau_blocks: EMA_TAU_BLOCKS,
        }
    }
}

/// CW20 balance query answered by cluster-token instances.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenQueryMsg {
    Balance { address: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenBalanceResponse {
    #[serde(with = "uint128")]
    pub balance: u128,
}

#[derive(Debug)]
enum Instance {
    Oracle {
        owner: String,
        oracle: StaticOracle,
    },
    Penalty {
        params: PenaltyParams,
    },
    Factory {
        owner: String,
        token_code_id: u64,
        cluster_code_id: u64,
        clusters: Vec<String>,
    },
    Cluster {
        engine: ClusterEngine,
        balances: BTreeMap<String, u128>,
    },
    Token {
        cluster: String,
    },
    Opaque,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Oracle,
    Factory,
    Cluster,
    Passive,
}

impl Instance {
    fn kind(&self) -> Kind {
        match self {
            Self::Oracle { .. } => Kind::Oracle,
            Self::Factory { .. } => Kind::Factory,
            Self::Cluster { .. } => Kind::Cluster,
            Self::Penalty { .. } | Self::Token { .. } | Self::Opaque => Kind::Passive,
        }
    }
}

#[derive(Debug)]
struct Contract {
    code_id: u64,
    instance: Instance,
}

fn invalid(msg: impl Into<String>) -> NimbusError {
    ClusterError::InvalidInput(msg.into()).into()
}

fn attr(key: &str, value: impl ToString) -> Attribute {
    Attribute {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[derive(Debug)]
struct SimState {
    options: SimOptions,
    block: BlockInfo,
    code_sizes: Vec<usize>,
    contracts: BTreeMap<String, Contract>,
    next_address: u64,
    next_tx: u64,
}

impl SimState {
    fn new(options: SimOptions) -> Self {
        let block = BlockInfo {
            height: 1,
            time: options.genesis_time,
        };
        Self {
            options,
            block,
            code_sizes: Vec::new(),
            contracts: BTreeMap::new(),
            next_address: 1,
            next_tx: 1,
        }
    }

    fn advance(&mut self, blocks: u64) {
        self.block.height += blocks;
        self.block.time += blocks * BLOCK_TIME_SECS;
    }

    fn fresh_address(&mut self) -> String {
        let addr = format!("terra1sim{:033}", self.next_address);
        self.next_address += 1;
        addr
    }

    fn receipt(&mut self, attributes: Vec<Attribute>) -> TxResult {
        let txhash = format!("{:064X}", self.next_tx);
        self.next_tx += 1;
        TxResult {
            txhash,
            height: self.block.height,
            attributes,
        }
    }

    fn contract(&self, addr: &str) -> Result<&Contract, NimbusError> {
        self.contracts
            .get(addr)
            .ok_or_else(|| invalid(format!("no contract at {addr}")))
    }

    fn oracle(&self, addr: &str) -> Result<&StaticOracle, NimbusError> {
        match &self.contract(addr)?.instance {
            Instance::Oracle { oracle, .. } => Ok(oracle),
            _ => Err(invalid(format!("{addr} is not a pricing oracle"))),
        }
    }

    fn penalty_model(&self, addr: &str) -> Result<PenaltyModel, NimbusError> {
        match &self.contract(addr)?.instance {
            Instance::Penalty { params } => {
                Ok(PenaltyModel::with_tau(params.clone(), self.options.ema_tau_blocks)?)
            }
            _ => Err(invalid(format!("{addr} is not a penalty contract"))),
        }
    }

    fn cluster(&self, addr: &str) -> Result<&ClusterEngine, NimbusError> {
        match &self.contract(addr)?.instance {
            Instance::Cluster { engine, .. } => Ok(engine),
            _ => Err(invalid(format!("{addr} is not a cluster"))),
        }
    }

    fn cluster_mut(
        &mut self,
        addr: &str,
    ) -> Result<(&mut ClusterEngine, &mut BTreeMap<String, u128>), NimbusError> {
        match self.contracts.get_mut(addr).map(|c| &mut c.instance) {
            Some(Instance::Cluster { engine, balances }) => Ok((engine, balances)),
            _ => Err(invalid(format!("{addr} is not a cluster"))),
        }
    }

    fn store_code(&mut self, wasm: &[u8]) -> Result<u64, NimbusError> {
        if wasm.is_empty() {
            return Err(invalid("empty wasm bytecode"));
        }
        self.advance(1);
        self.code_sizes.push(wasm.len());
        let code_id = self.code_sizes.len() as u64;
        debug!(code_id, bytes = wasm.len(), "stored code");
        Ok(code_id)
    }

    fn instantiate(&mut self, sender: &str, code_id: u64, msg: &Value) -> Result<String, NimbusError> {
        if code_id == 0 || code_id as usize > self.code_sizes.len() {
            return Err(invalid(format!("unknown code id {code_id}")));
        }
        self.advance(1);

        let instance = if let Ok(m) = serde_json::from_value::<PenaltyInstantiateMsg>(msg.clone()) {
            m.penalty_params.validate()?;
            Instance::Penalty {
                params: m.penalty_params,
            }
        } else if let Ok(m) = serde_json::from_value::<OracleInstantiateMsg>(msg.clone()) {
            Instance::Oracle {
                owner: m.owner,
                oracle: StaticOracle::new(),
            }
        } else if let Ok(m) = serde_json::from_value::<FactoryInstantiateMsg>(msg.clone()) {
            Instance::Factory {
                owner: m.owner,
                token_code_id: m.token_code_id,
                cluster_code_id: m.cluster_code_id,
                clusters: Vec::new(),
            }
        } else {
            Instance::Opaque
        };

        let addr = self.fresh_address();
        debug!(%addr, code_id, %sender, "instantiated contract");
        self.contracts.insert(addr.clone(), Contract { code_id, instance });
        Ok(addr)
    }

    fn execute(
        &mut self,
        sender: &str,
        contract: &str,
        msg: &Value,
        funds: &[Coin],
    ) -> Result<TxResult, NimbusError> {
        self.advance(1);
        let kind = self.contract(contract)?.instance.kind();
        let attributes = match kind {
            Kind::Oracle => {
                self.execute_oracle(sender, contract, serde_json::from_value(msg.clone())?)?
            }
            Kind::Factory => {
                self.execute_factory(sender, contract, serde_json::from_value(msg.clone())?)?
            }
            Kind::Cluster => self.execute_cluster(
                sender,
                contract,
                serde_json::from_value(msg.clone())?,
                funds,
            )?,
            Kind::Passive => {
                return Err(invalid(format!("{contract} does not accept execute messages")));
            }
        };
        Ok(self.receipt(attributes))
    }

    fn execute_oracle(
        &mut self,
        sender: &str,
        contract: &str,
        msg: OracleExecuteMsg,
    ) -> Result<Vec<Attribute>, NimbusError> {
        let time = self.block.time;
        let Some(Instance::Oracle { owner, oracle }) =
            self.contracts.get_mut(contract).map(|c| &mut c.instance)
        else {
            return Err(invalid(format!("{contract} is not a pricing oracle")));
        };
        if sender != owner.as_str() {
            return Err(ClusterError::Unauthorized(format!("{sender} may not feed prices")).into());
        }
        match msg {
            OracleExecuteMsg::FeedPrices { prices } => {
                for entry in &prices {
                    oracle.set(&entry.info, entry.price.clone(), time);
                }
                Ok(vec![attr("action", "feed_prices"), attr("count", prices.len())])
            }
        }
    }

    fn execute_factory(
        &mut self,
        sender: &str,
        contract: &str,
        msg: FactoryExecuteMsg,
    ) -> Result<Vec<Attribute>, NimbusError> {
        let FactoryExecuteMsg::CreateCluster { params } = msg;
        let (token_code_id, cluster_code_id) = match &self.contract(contract)?.instance {
            Instance::Factory {
                owner,
                token_code_id,
                cluster_code_id,
                ..
            } => {
                if sender != owner.as_str() {
                    return Err(ClusterError::Unauthorized(format!(
                        "{sender} may not create clusters"
                    ))
                    .into());
                }
                (*token_code_id, *cluster_code_id)
            }
            _ => return Err(invalid(format!("{contract} is not a factory"))),
        };
        self.oracle(&params.pricing_oracle)?;
        let model = self.penalty_model(&params.penalty)?;

        let cluster_addr = self.fresh_address();
        let token_addr = self.fresh_address();
        let config = ClusterConfig {
            name: params.name,
            symbol: params.symbol,
            description: params.description,
            owner: sender.to_string(),
            cluster_token: Some(token_addr.clone()),
            factory: contract.to_string(),
            pricing_oracle: params.pricing_oracle,
            target_oracle: params.target_oracle,
            penalty: params.penalty,
            active: true,
        };
        let engine = ClusterEngine::new(cluster_addr.clone(), config, params.target, Box::new(model))?
            .with_stale_threshold(self.options.oracle_stale_threshold_secs);

        self.contracts.insert(
            cluster_addr.clone(),
            Contract {
                code_id: cluster_code_id,
                instance: Instance::Cluster {
                    engine,
                    balances: BTreeMap::new(),
                },
            },
        );
        self.contracts.insert(
            token_addr.clone(),
            Contract {
                code_id: token_code_id,
                instance: Instance::Token {
                    cluster: cluster_addr.clone(),
                },
            },
        );
        if let Some(Instance::Factory { clusters, .. }) =
            self.contracts.get_mut(contract).map(|c| &mut c.instance)
        {
            clusters.push(cluster_addr.clone());
        }
        debug!(cluster = %cluster_addr, token = %token_addr, "created cluster");

        Ok(vec![
            attr("action", "create_cluster"),
            attr("cluster_addr", &cluster_addr),
            attr("cluster_token_addr", &token_addr),
        ])
    }

    fn execute_cluster(
        &mut self,
        sender: &str,
        contract: &str,
        msg: ClusterExecuteMsg,
        funds: &[Coin],
    ) -> Result<Vec<Attribute>, NimbusError> {
        let block = self.block;
        match msg {
            ClusterExecuteMsg::RebalanceCreate {
                asset_amounts,
                min_tokens,
            } => {
                for asset in asset_amounts.iter().filter(|a| a.info.is_native() && a.amount > 0) {
                    let attached: u128 = funds
                        .iter()
                        .filter(|c| c.denom == asset.info.identifier())
                        .map(|c| c.amount)
                        .sum();
                    if attached < asset.amount {
                        return Err(invalid(format!(
                            "deposit of {}{} not covered by attached funds ({attached})",
                            asset.amount,
                            asset.info.identifier()
                        )));
                    }
                }
                let oracle = self.oracle(&self.cluster(contract)?.config().pricing_oracle)?.clone();
                let (engine, balances) = self.cluster_mut(contract)?;
                let minted = engine.create_assets(block, &oracle, &asset_amounts, min_tokens)?;
                *balances.entry(sender.to_string()).or_default() += minted;
                Ok(vec![attr("action", "rebalance_create"), attr("minted", minted)])
            }
            ClusterExecuteMsg::RebalanceRedeem {
                max_tokens,
                asset_amounts,
            } => {
                let oracle = self.oracle(&self.cluster(contract)?.config().pricing_oracle)?.clone();
                let (engine, balances) = self.cluster_mut(contract)?;
                let held = balances.get(sender).copied().unwrap_or(0);
                if held < max_tokens {
                    return Err(invalid(format!(
                        "{sender} holds {held} cluster tokens, offered {max_tokens}"
                    )));
                }
                let out = engine.redeem_assets(block, &oracle, max_tokens, asset_amounts.as_deref())?;
                balances.insert(sender.to_string(), held - out.burned);
                let paid: Vec<String> = out.assets.iter().map(u128::to_string).collect();
                Ok(vec![
                    attr("action", "rebalance_redeem"),
                    attr("burned", out.burned),
                    attr("redeem_assets", paid.join(",")),
                ])
            }
            ClusterExecuteMsg::UpdateTarget { target } => {
                let (engine, _) = self.cluster_mut(contract)?;
                engine.update_target(sender, target)?;
                Ok(vec![attr("action", "update_target")])
            }
            ClusterExecuteMsg::Decommission {} => {
                let (engine, _) = self.cluster_mut(contract)?;
                engine.decommission(sender)?;
                Ok(vec![attr("action", "decommission")])
            }
            ClusterExecuteMsg::ResetPenalty { penalty } => {
                let model = self.penalty_model(&penalty)?;
                let (engine, _) = self.cluster_mut(contract)?;
                engine.reset_penalty(sender, penalty, Box::new(model))?;
                Ok(vec![attr("action", "reset_penalty")])
            }
        }
    }

    fn query(&self, contract: &str, query: &Value) -> Result<Value, NimbusError> {
        let value = match &self.contract(contract)?.instance {
            Instance::Cluster { engine, .. } => match serde_json::from_value(query.clone())? {
                ClusterQueryMsg::ClusterState { .. } => {
                    let oracle = self.oracle(&engine.config().pricing_oracle)?;
                    serde_json::to_value(engine.state(oracle)?)?
                }
                ClusterQueryMsg::Config {} => serde_json::to_value(ClusterConfigResponse {
                    config: engine.config().clone(),
                })?,
                ClusterQueryMsg::Target {} => serde_json::to_value(TargetResponse {
                    target: engine.target_entries(),
                })?,
            },
            Instance::Oracle { oracle, .. } => match serde_json::from_value(query.clone())? {
                OracleQueryMsg::Price { asset } => serde_json::to_value(oracle.quote(&asset)?)?,
            },
            Instance::Penalty { params } => match serde_json::from_value(query.clone())? {
                PenaltyQueryMsg::Params {} => {
                    let user = self.contracts.values().find_map(|c| match &c.instance {
                        Instance::Cluster { engine, .. } if engine.config().penalty == contract => {
                            Some(engine.penalty())
                        }
                        _ => None,
                    });
                    let (ema, last_block) = match user {
                        Some(p) => (p.ema().clone(), p.last_block()),
                        None => (Rational::zero(), 0),
                    };
                    serde_json::to_value(PenaltyParamsResponse {
                        penalty_params: params.clone(),
                        ema,
                        last_block,
                    })?
                }
            },
            Instance::Token { cluster } => match serde_json::from_value(query.clone())? {
                TokenQueryMsg::Balance { address } => {
                    let balance = match &self.contract(cluster)?.instance {
                        Instance::Cluster { balances, .. } => {
                            balances.get(&address).copied().unwrap_or(0)
                        }
                        _ => 0,
                    };
                    serde_json::to_value(TokenBalanceResponse { balance })?
                }
            },
            Instance::Factory { clusters, .. } => serde_json::to_value(clusters)?,
            Instance::Opaque => return Err(invalid(format!("{contract} answers no queries"))),
        };
        Ok(value)
    }
}

/// Shared handle to a simulated chain, bound to one sender account.
///
/// Clones share the same chain; [`as_sender`](Self::as_sender) switches
/// the signing account.
#[derive(Clone)]
pub struct Simulator {
    state: Arc<Mutex<SimState>>,
    sender: String,
}

impl Simulator {
    pub fn new(sender: impl Into<String>) -> Self {
        Self::with_options(sender, SimOptions::default())
    }

    pub fn with_options(sender: impl Into<String>, options: SimOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(options))),
            sender: sender.into(),
        }
    }

    /// Handle on the same chain acting as `sender`.
    pub fn as_sender(&self, sender: impl Into<String>) -> Self {
        Self {
            state: Arc::clone(&self.state),
            sender: sender.into(),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn block(&self) -> BlockInfo {
        self.state.lock().block
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.state.lock().advance(blocks);
    }

    /// Refresh oracle prices at the current block time, bypassing the owner check.
    pub fn set_prices(&self, oracle: &str, prices: &[PriceEntry]) -> Result<(), NimbusError> {
        let mut state = self.state.lock();
        let time = state.block.time;
        match state.contracts.get_mut(oracle).map(|c| &mut c.instance) {
            Some(Instance::Oracle { oracle, .. }) => {
                for entry in prices {
                    oracle.set(&entry.info, entry.price.clone(), time);
                }
                Ok(())
            }
            _ => Err(invalid(format!("{oracle} is not a pricing oracle"))),
        }
    }

    /// Cluster-token balance of `account`.
    pub fn balance(&self, cluster: &str, account: &str) -> u128 {
        match self.state.lock().contracts.get(cluster).map(|c| &c.instance) {
            Some(Instance::Cluster { balances, .. }) => balances.get(account).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Move cluster tokens between accounts.
    pub fn transfer(&self, cluster: &str, to: &str, amount: u128) -> Result<(), NimbusError> {
        let mut state = self.state.lock();
        let (_, balances) = state.cluster_mut(cluster)?;
        let held = balances.get(&self.sender).copied().unwrap_or(0);
        if held < amount {
            return Err(invalid(format!("{} holds only {held}", self.sender)));
        }
        balances.insert(self.sender.clone(), held - amount);
        *balances.entry(to.to_string()).or_default() += amount;
        Ok(())
    }

    pub fn cluster_state(&self, cluster: &str) -> Result<ClusterStateResponse, NimbusError> {
        let state = self.state.lock();
        let engine = state.cluster(cluster)?;
        let oracle = state.oracle(&engine.config().pricing_oracle)?;
        Ok(engine.state(oracle)?)
    }

    /// Code id a contract was instantiated from.
    pub fn code_id_of(&self, contract: &str) -> Option<u64> {
        self.state.lock().contracts.get(contract).map(|c| c.code_id)
    }

    pub fn code_count(&self) -> usize {
        self.state.lock().code_sizes.len()
    }

    pub fn store_code(&self, wasm: &[u8]) -> Result<u64, NimbusError> {
        self.state.lock().store_code(wasm)
    }

    pub fn instantiate_contract(&self, code_id: u64, msg: &Value) -> Result<String, NimbusError> {
        self.state.lock().instantiate(&self.sender, code_id, msg)
    }

    pub fn execute_contract(
        &self,
        contract: &str,
        msg: &Value,
        funds: &[Coin],
    ) -> Result<TxResult, NimbusError> {
        self.state.lock().execute(&self.sender, contract, msg, funds)
    }

    pub fn query_contract(&self, contract: &str, query: &Value) -> Result<Value, NimbusError> {
        self.state.lock().query(contract, query)
    }
}

#[async_trait]
impl BlockchainClient for Simulator {
    async fn upload_code(&self, wasm: &[u8]) -> Result<u64, NimbusError> {
        self.store_code(wasm)
    }

    async fn instantiate(&self, code_id: u64, init_msg: &Value) -> Result<String, NimbusError> {
        self.instantiate_contract(code_id, init_msg)
    }

    async fn execute(
        &self,
        contract: &str,
        msg: &Value,
        funds: &[Coin],
    ) -> Result<TxResult, NimbusError> {
        self.execute_contract(contract, msg, funds)
    }

    async fn query(&self, contract: &str, query: &Value) -> Result<Value, NimbusError> {
        self.query_contract(contract, query)
    }

    async fn current_block_height(&self) -> Result<u64, NimbusError> {
        Ok(self.block().height)
    }
}
