//! # nimbus-chain — Blockchain collaborator adapter.
//!
//! - [`lcd::LcdClient`]: [`BlockchainClient`](nimbus_core::traits::BlockchainClient)
//!   over the Terra LCD, transactions signed by a [`signer::TxBroadcaster`]
//! - [`sequence::AccountSequence`]: per-account sequence counter with
//!   nonce-mismatch retry
//! - [`cluster_api`]: typed factory/cluster/oracle message helpers
//! - [`deploy`]: ordered code upload, instantiation, and artifact bookkeeping

pub mod cluster_api;
pub mod deploy;
pub mod lcd;
pub mod sequence;
pub mod signer;

pub use deploy::{Artifacts, ChainArtifacts, ClusterSpec, DeployPlan, Deployer};
pub use lcd::LcdClient;
pub use sequence::{AccountInfo, AccountSequence};
pub use signer::{BroadcastResult, SignDoc, SignerRelay, TxBroadcaster, WasmMsg};
