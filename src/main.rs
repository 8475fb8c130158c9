mod agent;
mod config;
mod connection;
mod delivery;
mod sensors;
mod status;
mod transport;

use agent::{Agent, Pacing};
use anyhow::{bail, Context, Result};
use clap::Parser;
use config::AgentConfig;
use connection::{AgentClock, LinkManager, LinkTimeouts, ProcessRestart};
use delivery::HttpDelivery;
use status::StatusBoard;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Samples local sensors and posts each reading to the collector
#[derive(Debug, Parser)]
#[command(name = "habitat-node", version)]
struct Args {
    /// Configuration file (TOML); built-in defaults are used without one
    #[arg(short, long, env = "HABITAT_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => {
            warn!("No config file given, using built-in defaults");
            AgentConfig::default()
        }
    };

    info!("Habitat node starting: {}", config.device_id);
    info!("  Collector: {}", config.collector.endpoint);
    info!("  Sensors: {}", config.sensors.len());

    let clock = AgentClock::start();

    let link = LinkManager::new(
        LinkTimeouts::from(&config.timing),
        transport::from_config(&config.link),
        Arc::new(ProcessRestart::new(config.restart.exit_code)),
        clock,
    );

    let delivery = HttpDelivery::new(&config.collector).context("setting up delivery")?;

    let board = Arc::new(StatusBoard::new(
        config.sensors.iter().map(|s| s.name.clone()),
        config.status.file.clone(),
    ));

    let mut agent = Agent::new(
        config.sensors.clone(),
        sensors::from_config(&config.source),
        link,
        Arc::new(delivery),
        board.clone(),
        Pacing::from(&config.timing),
        clock,
    );

    if args.once {
        let report = agent.run_tick().await;
        info!(
            "Tick {} done: link {}, phase {:?}",
            report.tick,
            agent.link().state(),
            agent.phase()
        );
        for sensor in &config.sensors {
            if let Some(status) = board.get(&sensor.name).await {
                info!("  {}: {}", status.name, status.label());
            }
        }
        return Ok(());
    }

    agent.run().await;
    bail!("agent stopped after the link could not be recovered")
}
