//! Periodic retarget loop.
//!
//! One tick walks the jobs in order: compute a target from market data,
//! submit it if it differs from the cluster's current one, then read back
//! and log the cluster state. A tick is abandoned on the first error;
//! transient errors skip to the next period, anything else stops the loop.

use std::sync::Arc;
use std::time::Duration;

use nimbus_chain::cluster_api;
use nimbus_core::constants::TICK_TIMEOUT_MARGIN_SECS;
use nimbus_core::error::NimbusError;
use nimbus_core::msg::ClusterStateResponse;
use nimbus_core::traits::{BlockchainClient, DataFeed};
use nimbus_core::types::{Asset, Target};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{error, info, warn};

use crate::job::Job;
use crate::policy::Policy;

/// Result of retargeting one cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterUpdate {
    pub address: String,
    pub symbol: String,
    pub previous: Vec<Asset>,
    pub target: Target,
    pub txhash: String,
    pub state: ClusterStateResponse,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub now: u64,
    pub updated: Vec<ClusterUpdate>,
    /// Clusters left alone: no signal, or target already current.
    pub unchanged: Vec<String>,
}

struct Slot {
    job: Job,
    policy: Policy,
}

pub struct Retargeter {
    client: Arc<dyn BlockchainClient>,
    feed: Arc<dyn DataFeed>,
    slots: Vec<Slot>,
    period: Duration,
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

impl Retargeter {
    pub fn new(
        client: Arc<dyn BlockchainClient>,
        feed: Arc<dyn DataFeed>,
        jobs: Vec<Job>,
        period: Duration,
    ) -> Result<Self, NimbusError> {
        let slots = jobs
            .into_iter()
            .map(|job| {
                job.validate()?;
                let policy = job.policy.build()?;
                Ok(Slot { job, policy })
            })
            .collect::<Result<Vec<_>, NimbusError>>()?;
        Ok(Self {
            client,
            feed,
            slots,
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Period minus the safety margin, never below one second.
    pub fn tick_timeout(&self) -> Duration {
        self.period
            .saturating_sub(Duration::from_secs(TICK_TIMEOUT_MARGIN_SECS))
            .max(Duration::from_secs(1))
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().map(|s| &s.job)
    }

    /// Run one retarget pass over every job at `now` (unix seconds).
    pub async fn tick(&mut self, now: u64) -> Result<TickReport, NimbusError> {
        let mut report = TickReport {
            now,
            ..TickReport::default()
        };
        for slot in &mut self.slots {
            let job = &slot.job;
            let Some(target) = slot
                .policy
                .compute_target(&job.universe, self.feed.as_ref(), now, job.scale)
                .await?
            else {
                warn!(cluster = %job.address, symbol = %job.symbol, policy = slot.policy.name(), "no allocation, target kept");
                report.unchanged.push(job.address.clone());
                continue;
            };

            let client = self.client.as_ref();
            let previous = cluster_api::query_target(client, &job.address).await?;
            if previous.as_slice() == target.entries() {
                info!(cluster = %job.address, symbol = %job.symbol, "target already current");
                report.unchanged.push(job.address.clone());
                continue;
            }

            let tx = cluster_api::update_target(client, &job.address, &target).await?;
            let state = cluster_api::query_cluster_state(client, &job.address).await?;
            info!(
                cluster = %job.address,
                symbol = %job.symbol,
                policy = slot.policy.name(),
                txhash = %tx.txhash,
                assets = target.len(),
                supply = state.outstanding_balance_tokens,
                notional = %state.notional(),
                "retargeted"
            );
            report.updated.push(ClusterUpdate {
                address: job.address.clone(),
                symbol: job.symbol.clone(),
                previous,
                target,
                txhash: tx.txhash,
                state,
            });
        }
        Ok(report)
    }

    /// Tick every period until `shutdown` flips or its sender goes away.
    ///
    /// Returns the first non-transient error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), NimbusError> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let limit = self.tick_timeout();
        info!(jobs = self.slots.len(), period_secs = self.period.as_secs(), "retargeter started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            let now = unix_now();
            let outcome = tokio::select! {
                r = timeout(limit, self.tick(now)) => r,
                _ = shutdown.changed() => break,
            };
            match outcome {
                Ok(Ok(report)) => info!(
                    updated = report.updated.len(),
                    unchanged = report.unchanged.len(),
                    "tick complete"
                ),
                Ok(Err(e)) if e.is_transient() => warn!(error = %e, "tick skipped"),
                Ok(Err(e)) => {
                    error!(error = %e, "tick failed");
                    return Err(e);
                }
                Err(_) => warn!(limit_secs = limit.as_secs(), "tick timed out"),
            }
        }
        info!("retargeter stopped");
        Ok(())
    }
}
