//! PacketFlow server binary.
//!
//! Loads a network (or the built-in reference network), ticks it on a fixed
//! period and serves snapshots over HTTP and WebSocket until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use packetflow_data::{NetworkConfig, load_network};
use packetflow_server::driver::{self, Shutdown};
use packetflow_server::http::{AppState, router};
use packetflow_server::tracing_setup::{CliLogLevel, init_tracing};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "packetflow")]
#[command(about = "Tick-based packet-switched network simulator")]
#[command(version)]
struct Cli {
    /// Network definition (.ron, .toml or .json). Defaults to the built-in
    /// five-node reference network.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address for the HTTP and WebSocket server.
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Override the configured tick period in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Override the configured destination seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Console log level (`RUST_LOG` takes precedence).
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Also write a full trace log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.log_level.as_tracing_level(), cli.log_file.as_deref()) {
        eprintln!("failed to initialize logging: {error:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_network(path)
            .with_context(|| format!("loading network from {}", path.display()))?,
        None => NetworkConfig::reference(),
    };
    if let Some(ms) = cli.tick_ms {
        config.tick_interval_ms = ms;
        config.validate().context("invalid --tick-ms")?;
    }
    let seed = cli.seed.unwrap_or_else(|| config.seed_or_clock());
    let sim = config.build_simulation(seed)?;
    tracing::info!(seed, allocation = ?config.allocation, "simulation ready");

    let shutdown = Shutdown::new();
    let driver = driver::spawn(sim, config.tick_interval(), shutdown.clone());
    let app = router(AppState::from_driver(&driver));

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    tracing::info!(addr = %cli.bind, "listening");

    let stop = shutdown;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
            stop.trigger();
        })
        .await?;

    let sim = driver.stop().await?;
    tracing::info!(ticks = sim.tick(), "shut down");
    Ok(())
}
