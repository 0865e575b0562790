//! Bet Ledger API Server Binary
//!
//! Loads configuration, picks the randomness source and serves the HTTP API.

use bet_ledger::api::ApiServer;
use bet_ledger::config::ConfigLoader;
use bet_ledger::games::{OsRandom, RandomSource, SeededRandom, VrfRandom};
use bet_ledger::SettlementOrchestrator;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bet-ledger-api")]
#[command(about = "Bet settlement and treasury ledger API", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Override API host
    #[arg(long)]
    host: Option<String>,

    /// Override API port
    #[arg(long)]
    port: Option<u16>,

    /// Use a seeded generator (reproducible outcomes, testing only)
    #[arg(long, conflicts_with = "vrf")]
    seed: Option<u64>,

    /// Use VRF draws so every outcome carries a verifiable proof
    #[arg(long)]
    vrf: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(ref path) = args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    if let Some(ref path) = args.config {
        info!("Loaded configuration from {}", path);
    }

    let source: Arc<dyn RandomSource> = match (args.seed, args.vrf) {
        (Some(seed), _) => {
            warn!(seed, "Seeded randomness enabled, outcomes are predictable");
            Arc::new(SeededRandom::new(seed))
        }
        (None, true) => {
            let vrf = VrfRandom::new_random();
            info!(public_key = %vrf.public_key_hex(), "VRF randomness enabled");
            Arc::new(vrf)
        }
        (None, false) => Arc::new(OsRandom),
    };

    let orchestrator = Arc::new(SettlementOrchestrator::new(config.ledger.clone(), source));
    ApiServer::new(config.api, orchestrator).run().await?;

    Ok(())
}
