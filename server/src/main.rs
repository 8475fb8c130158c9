mod routes;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use store::LogStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Receives sensor records and keeps per-sensor CSV logs
#[derive(Debug, Parser)]
#[command(name = "habitat-collector", version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:5020")]
    bind: String,

    /// Directory for the per-sensor logs
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let store = LogStore::open(args.log_dir.clone())
        .await
        .with_context(|| format!("opening log directory {}", args.log_dir.display()))?;

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!("Collector listening on {}", args.bind);
    info!("  Logs: {}", args.log_dir.display());

    axum::serve(listener, routes::router(Arc::new(store))).await?;
    Ok(())
}
