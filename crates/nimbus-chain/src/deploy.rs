//! Ordered deployment of the Nimbus contract set.
//!
//! Codes are uploaded in a fixed order, then the oracle and factory are
//! instantiated, then each planned cluster gets its own penalty contract
//! and is created through the factory. Progress is written to the
//! artifacts file after every step, so an interrupted run resumes where it
//! stopped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use nimbus_core::constants::BASE_DENOM;
use nimbus_core::error::{ConfigError, NimbusError};
use nimbus_core::msg::{
    ClusterParams, FactoryInstantiateMsg, OracleInstantiateMsg, PenaltyInstantiateMsg, PriceEntry,
};
use nimbus_core::traits::BlockchainClient;
use nimbus_core::types::{PenaltyParams, Target};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::cluster_api;

/// Contracts in upload order. Files are expected as `<name>.wasm`.
pub const CONTRACTS: [&str; 5] = [
    "cw20_token",
    "nimbus_oracle",
    "nimbus_penalty",
    "nimbus_cluster",
    "nimbus_factory",
];

pub const ORACLE: &str = "oracle";
pub const FACTORY: &str = "factory";

/// Hex SHA-256 of wasm bytecode.
pub fn checksum(wasm: &[u8]) -> String {
    hex::encode(Sha256::digest(wasm))
}

/// Read `<name>.wasm` for every contract in [`CONTRACTS`].
pub fn load_wasm_dir(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>, NimbusError> {
    let mut out = BTreeMap::new();
    for name in CONTRACTS {
        let path = dir.join(format!("{name}.wasm"));
        let bytes = fs::read(&path)
            .map_err(|e| NimbusError::Io(format!("{}: {e}", path.display())))?;
        out.insert(name.to_string(), bytes);
    }
    Ok(out)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DeployedCluster {
    pub cluster: String,
    pub token: Option<String>,
    pub penalty: String,
}

/// Deployment record for one chain.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainArtifacts {
    #[serde(default)]
    pub code_ids: BTreeMap<String, u64>,
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
    /// Singleton contracts (`oracle`, `factory`) by role.
    #[serde(default)]
    pub contracts: BTreeMap<String, String>,
    /// Clusters by symbol.
    #[serde(default)]
    pub clusters: BTreeMap<String, DeployedCluster>,
}

/// Deployment records keyed by chain id.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Artifacts {
    pub chains: BTreeMap<String, ChainArtifacts>,
}

impl Artifacts {
    /// Load from `path`; a missing file is an empty record.
    pub fn load(path: &Path) -> Result<Self, NimbusError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write atomically through a sibling temp file.
    pub fn save(&self, path: &Path) -> Result<(), NimbusError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn chain(&self, chain_id: &str) -> Option<&ChainArtifacts> {
        self.chains.get(chain_id)
    }
}

/// One cluster to create.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClusterSpec {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    pub target: Target,
    #[serde(default)]
    pub penalty_params: PenaltyParams,
    /// Account allowed to retarget; defaults to the plan owner.
    #[serde(default)]
    pub target_oracle: Option<String>,
}

/// What to deploy, read from a JSON plan file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DeployPlan {
    pub owner: String,
    #[serde(default = "default_base_denom")]
    pub base_denom: String,
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
    /// Prices fed to a freshly instantiated oracle.
    #[serde(default)]
    pub initial_prices: Vec<PriceEntry>,
}

fn default_base_denom() -> String {
    BASE_DENOM.to_string()
}

impl DeployPlan {
    pub fn load(path: &Path) -> Result<Self, NimbusError> {
        let bytes = fs::read(path)?;
        let plan: Self = serde_json::from_slice(&bytes)?;
        for spec in &plan.clusters {
            spec.target.validate()?;
            spec.penalty_params.validate()?;
        }
        Ok(plan)
    }
}

/// Drives a deployment against one chain.
pub struct Deployer<'a, C: ?Sized> {
    client: &'a C,
    chain_id: String,
    path: PathBuf,
    artifacts: Artifacts,
}

impl<'a, C> Deployer<'a, C>
where
    C: BlockchainClient + ?Sized,
{
    pub fn new(client: &'a C, chain_id: &str, path: impl Into<PathBuf>) -> Result<Self, NimbusError> {
        let path = path.into();
        let artifacts = Artifacts::load(&path)?;
        Ok(Self {
            client,
            chain_id: chain_id.to_string(),
            path,
            artifacts,
        })
    }

    /// Record for this deployer's chain.
    pub fn record(&self) -> ChainArtifacts {
        self.artifacts
            .chain(&self.chain_id)
            .cloned()
            .unwrap_or_default()
    }

    fn record_mut(&mut self) -> &mut ChainArtifacts {
        self.artifacts.chains.entry(self.chain_id.clone()).or_default()
    }

    fn save(&self) -> Result<(), NimbusError> {
        self.artifacts.save(&self.path)
    }

    fn code_id(&self, name: &'static str) -> Result<u64, NimbusError> {
        self.artifacts
            .chain(&self.chain_id)
            .and_then(|r| r.code_ids.get(name).copied())
            .ok_or_else(|| ConfigError::Missing { key: name }.into())
    }

    /// Upload every contract whose checksum differs from the recorded one.
    pub async fn upload_codes(&mut self, wasm: &BTreeMap<String, Vec<u8>>) -> Result<(), NimbusError> {
        for name in CONTRACTS {
            let bytes = wasm.get(name).ok_or(ConfigError::Missing { key: name })?;
            let sum = checksum(bytes);
            let record = self.record();
            if let (Some(id), Some(old)) = (record.code_ids.get(name), record.checksums.get(name)) {
                if *old == sum {
                    info!(contract = name, code_id = id, "code unchanged, reusing");
                    continue;
                }
            }
            let code_id = self.client.upload_code(bytes).await?;
            info!(contract = name, code_id, checksum = %sum, "uploaded code");
            let record = self.record_mut();
            record.code_ids.insert(name.to_string(), code_id);
            record.checksums.insert(name.to_string(), sum);
            self.save()?;
        }
        Ok(())
    }

    /// Instantiate the pricing oracle and the factory if not yet recorded.
    pub async fn instantiate_core(&mut self, plan: &DeployPlan) -> Result<(), NimbusError> {
        if !self.record().contracts.contains_key(ORACLE) {
            let msg = OracleInstantiateMsg {
                owner: plan.owner.clone(),
                base_denom: plan.base_denom.clone(),
            };
            let code_id = self.code_id("nimbus_oracle")?;
            let addr = self
                .client
                .instantiate(code_id, &serde_json::to_value(&msg)?)
                .await?;
            info!(%addr, "instantiated oracle");
            self.record_mut().contracts.insert(ORACLE.to_string(), addr.clone());
            self.save()?;

            if !plan.initial_prices.is_empty() {
                cluster_api::feed_prices(self.client, &addr, &plan.initial_prices).await?;
                info!(count = plan.initial_prices.len(), "fed initial prices");
            }
        }

        if !self.record().contracts.contains_key(FACTORY) {
            let msg = FactoryInstantiateMsg {
                owner: plan.owner.clone(),
                token_code_id: self.code_id("cw20_token")?,
                cluster_code_id: self.code_id("nimbus_cluster")?,
                base_denom: plan.base_denom.clone(),
            };
            let code_id = self.code_id("nimbus_factory")?;
            let addr = self
                .client
                .instantiate(code_id, &serde_json::to_value(&msg)?)
                .await?;
            info!(%addr, "instantiated factory");
            self.record_mut().contracts.insert(FACTORY.to_string(), addr);
            self.save()?;
        }
        Ok(())
    }

    /// Create every planned cluster not yet recorded under its symbol.
    pub async fn deploy_clusters(&mut self, plan: &DeployPlan) -> Result<(), NimbusError> {
        let record = self.record();
        let oracle = record
            .contracts
            .get(ORACLE)
            .cloned()
            .ok_or(ConfigError::Missing { key: ORACLE })?;
        let factory = record
            .contracts
            .get(FACTORY)
            .cloned()
            .ok_or(ConfigError::Missing { key: FACTORY })?;

        for spec in &plan.clusters {
            if record.clusters.contains_key(&spec.symbol) {
                info!(symbol = %spec.symbol, "cluster already deployed");
                continue;
            }
            let msg = PenaltyInstantiateMsg {
                owner: plan.owner.clone(),
                penalty_params: spec.penalty_params.clone(),
            };
            let code_id = self.code_id("nimbus_penalty")?;
            let penalty = self
                .client
                .instantiate(code_id, &serde_json::to_value(&msg)?)
                .await?;

            let params = ClusterParams {
                name: spec.name.clone(),
                symbol: spec.symbol.clone(),
                description: spec.description.clone(),
                penalty: penalty.clone(),
                target: spec.target.clone(),
                pricing_oracle: oracle.clone(),
                target_oracle: spec
                    .target_oracle
                    .clone()
                    .unwrap_or_else(|| plan.owner.clone()),
            };
            let created = cluster_api::create_cluster(self.client, &factory, params).await?;
            self.record_mut().clusters.insert(
                spec.symbol.clone(),
                DeployedCluster {
                    cluster: created.cluster,
                    token: created.token,
                    penalty,
                },
            );
            self.save()?;
        }
        Ok(())
    }

    /// Full deployment; returns the resulting record.
    pub async fn run(
        &mut self,
        wasm: &BTreeMap<String, Vec<u8>>,
        plan: &DeployPlan,
    ) -> Result<ChainArtifacts, NimbusError> {
        info!(chain_id = %self.chain_id, clusters = plan.clusters.len(), "deploying");
        self.upload_codes(wasm).await?;
        self.instantiate_core(plan).await?;
        self.deploy_clusters(plan).await?;
        Ok(self.record())
    }
}
