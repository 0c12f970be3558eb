//! Nimbus deployment tool.
//!
//! Uploads the contract bytecode, instantiates the oracle and factory, and
//! creates every cluster in the plan. Progress is recorded in the artifacts
//! file after each step, so an interrupted run resumes where it stopped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nimbus_chain::deploy::load_wasm_dir;
use nimbus_chain::{DeployPlan, Deployer, LcdClient, SignerRelay};
use nimbus_core::config::NimbusConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "nimbus-deploy",
    version,
    about = "Deploy Nimbus contracts and clusters to a Terra chain"
)]
struct Args {
    /// Directory holding <contract>.wasm files
    #[arg(long, default_value = "wasm")]
    wasm_dir: PathBuf,

    /// Deployment plan (owner, clusters, initial prices)
    #[arg(long, default_value = "deploy.json")]
    plan: PathBuf,

    /// Artifacts file recording code ids and addresses per chain
    #[arg(long, default_value = None)]
    artifacts: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn artifacts_path(&self) -> PathBuf {
        self.artifacts.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("nimbus")
                .join("artifacts.json")
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let config = NimbusConfig::from_env().context("loading configuration")?;
    let plan = DeployPlan::load(&args.plan)
        .with_context(|| format!("loading plan {}", args.plan.display()))?;
    let wasm = load_wasm_dir(&args.wasm_dir)
        .with_context(|| format!("reading bytecode from {}", args.wasm_dir.display()))?;
    let artifacts = args.artifacts_path();
    info!(
        chain_id = %config.chain_id,
        lcd = %config.lcd_url,
        artifacts = %artifacts.display(),
        clusters = plan.clusters.len(),
        "nimbus-deploy v{}",
        env!("CARGO_PKG_VERSION")
    );

    let identity = config.require_identity().context("no signing identity")?;
    let signer_url = config
        .signer_url
        .as_deref()
        .context("SIGNER_URL is required to submit transactions")?;
    let relay = SignerRelay::connect(signer_url, identity)
        .await
        .context("connecting to signer")?;
    let client = LcdClient::new(&config, relay).context("building LCD client")?;

    let record = Deployer::new(&client, client.chain_id(), &artifacts)
        .context("loading artifacts")?
        .run(&wasm, &plan)
        .await
        .context("deployment failed")?;

    for (symbol, cluster) in &record.clusters {
        info!(%symbol, cluster = %cluster.cluster, "cluster deployed");
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // Keep stdout for the JSON record.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
