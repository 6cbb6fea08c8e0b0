//! vybe-live: live DEX trade ingest binary
//!
//! Streams Vybe trade events into a bounded buffer and serves recent trades,
//! health, and metrics over HTTP.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vybe_live_lib::{
    subscription_channel, EventBuffer, LiveConfig, LiveTrades, ServerState, SnapshotClient,
    StreamConnection,
};

#[derive(Parser, Debug)]
#[command(name = "vybe-live")]
#[command(about = "Live Solana DEX trade feed from Vybe")]
struct Args {
    /// HTTP server bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// Override the live WebSocket URL (otherwise VYBE_WS_URL or the default)
    #[arg(long)]
    ws_url: Option<String>,

    /// Do not start the live connection; only snapshot queries are served
    #[arg(long)]
    no_streaming: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = LiveConfig::from_env().context("loading configuration")?;
    if let Some(url) = args.ws_url {
        config.ws_url = url;
    }
    if args.no_streaming {
        config.streaming_enabled = false;
    }
    config.validate().context("validating configuration")?;
    info!(config = ?config, "Loaded configuration");

    let listen_addr: SocketAddr = args
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", args.listen_addr))?;

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(true).ok();
    });

    // Components shared by the listener and every query handler
    let buffer = Arc::new(EventBuffer::new());
    let (dispatcher, queue) = subscription_channel();
    let live = LiveTrades::new(Arc::clone(&buffer), dispatcher, config.streaming_enabled);

    let connection = StreamConnection::connect(
        config.ws_url.clone(),
        config.api_key.clone().unwrap_or_default(),
        Arc::clone(&buffer),
        queue,
    )
    .with_enabled(config.streaming_enabled)
    .with_reconnect_delay(config.reconnect_delay)
    .with_live_subscribe(config.live_subscribe);

    let mut server_state = ServerState::new(live, connection.state_handle());
    match &config.api_key {
        Some(key) => {
            let client = SnapshotClient::new(&config.api_base_url, key.clone())
                .context("building snapshot client")?;
            server_state = server_state.with_snapshot(Arc::new(client));
        }
        None => warn!("VYBE_API_KEY not set, /trades/recent is unavailable"),
    }

    let connection_task = tokio::spawn(connection.run(shutdown_rx.clone()));

    if let Err(e) = vybe_live_lib::run_server(listen_addr, server_state, shutdown_rx).await {
        error!(error = %e, "HTTP server error");
        shutdown_tx.send(true).ok();
        connection_task.await.ok();
        return Err(e).context("running HTTP server");
    }

    shutdown_tx.send(true).ok();
    if let Err(e) = connection_task.await {
        error!(error = %e, "Connection task failed");
    }

    info!("vybe-live stopped");
    Ok(())
}
