//! Nimbus retarget bot.
//!
//! Loads the job file, connects to the chain through the LCD and the signing
//! sidecar, and recomputes every selected cluster's target once per period
//! until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nimbus_chain::{LcdClient, SignerRelay};
use nimbus_core::config::NimbusConfig;
use nimbus_feed::CompositeFeed;
use nimbus_retarget::{JobFile, Retargeter};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "nimbus-bot",
    version,
    about = "Periodically recompute and submit Nimbus cluster targets"
)]
struct Args {
    /// Clusters to drive, by address or symbol (all jobs when omitted)
    selectors: Vec<String>,

    /// Job file listing clusters, universes, and policies
    #[arg(long, default_value = "jobs.json")]
    jobs: PathBuf,

    /// Seconds between ticks (defaults to RETARGET_INTERVAL_SECS)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let config = NimbusConfig::from_env().context("loading configuration")?;
    info!(
        network = ?config.network,
        chain_id = %config.chain_id,
        lcd = %config.lcd_url,
        "nimbus-bot v{}",
        env!("CARGO_PKG_VERSION")
    );

    let jobs = JobFile::load(&args.jobs)
        .with_context(|| format!("loading jobs from {}", args.jobs.display()))?
        .select(&args.selectors)
        .context("selecting jobs")?;
    if jobs.is_empty() {
        warn!("no jobs selected, nothing to do");
        return Ok(());
    }

    let identity = config.require_identity().context("no signing identity")?;
    let signer_url = config
        .signer_url
        .as_deref()
        .context("SIGNER_URL is required to submit transactions")?;
    let relay = SignerRelay::connect(signer_url, identity)
        .await
        .context("connecting to signer")?;
    let client = LcdClient::new(&config, relay).context("building LCD client")?;
    info!(address = %client.address(), jobs = jobs.len(), "signer ready");

    let feed = CompositeFeed::public().context("building market data feed")?;
    let period = Duration::from_secs(args.interval_secs.unwrap_or(config.retarget_interval_secs));
    let mut retargeter = Retargeter::new(Arc::new(client), Arc::new(feed), jobs, period)
        .context("building retargeter")?;

    if args.once {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let report = retargeter.tick(now).await.context("tick failed")?;
        for update in &report.updated {
            info!(
                symbol = %update.symbol,
                cluster = %update.address,
                txhash = %update.txhash,
                "target updated"
            );
        }
        info!(unchanged = report.unchanged.len(), "single tick complete");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    retargeter.run(shutdown_rx).await.context("retarget loop failed")?;
    info!("nimbus-bot shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` overrides `level_str`. Pass `format = "json"` for structured
/// output; any other value gives human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
