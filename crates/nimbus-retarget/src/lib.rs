//! # nimbus-retarget — Target-composition control loop.
//!
//! A [`Policy`] turns market data from a
//! [`DataFeed`](nimbus_core::traits::DataFeed) into weights over a fixed
//! universe; [`weights`] converts those into an integer [`Target`](nimbus_core::types::Target);
//! the [`Retargeter`] submits it to each cluster on a fixed period.

pub mod activation;
pub mod job;
pub mod policy;
pub mod retargeter;
pub mod signals;
pub mod universe;
pub mod weights;

pub use activation::ActivationTable;
pub use job::{Job, JobFile};
pub use policy::{Policy, PolicySpec};
pub use retargeter::{ClusterUpdate, Retargeter, TickReport};
pub use universe::UniverseAsset;
