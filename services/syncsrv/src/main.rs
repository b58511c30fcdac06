//! Service entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use syncsrv::remote::HttpQueryClient;
use syncsrv::{api, AppState, SyncConfig};

#[derive(Parser)]
#[command(name = "syncsrv", about = "GridWatch data sync service", version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SYNCSRV_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = SyncConfig::load(args.config.as_deref()).context("configuration")?;

    if let Some(Command::Check) = args.command {
        println!("configuration OK");
        println!("  gateway endpoint: {}", config.remote.endpoint);
        println!("  api bind: {}", config.bind_addr());
        println!(
            "  poll intervals: alarms {}s, stats {}s, stations {}s, areas {}s",
            config.poll.active_alarms_secs,
            config.poll.stats_secs,
            config.poll.stations_secs,
            config.poll.areas_secs
        );
        return Ok(());
    }

    common::logging::init_with_config(config.logging.to_log_config(&config.service.name))?;
    info!(
        "{} v{} starting",
        config.service.name,
        env!("CARGO_PKG_VERSION")
    );

    let client = Arc::new(HttpQueryClient::new(
        config.remote.endpoint.clone(),
        config.request_timeout(),
    )?);

    let state = AppState::new(config, client);
    syncsrv::events::spawn_log_subscriber(&state.hub);
    state.start_sync_tasks();

    let addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("API listening on {addr}");

    let router = api::create_router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("API server error: {e}");
        }
    });

    let signal = common::shutdown::wait_for_signal().await;
    info!("received {signal}, shutting down");

    state.scheduler.stop_all().await;
    server.abort();
    info!("shutdown complete");
    Ok(())
}
