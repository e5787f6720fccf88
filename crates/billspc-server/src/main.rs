//! # billspc-server
//!
//! Runs the Bill's PC BLE peripheral and its HTTP surface.
//!
//! ## Running
//!
//! ```bash
//! # On a BlueZ host
//! cargo run --package billspc-server
//!
//! # Without hardware, events injected through /api/mock
//! cargo run --package billspc-server --features mock-bluetooth
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;

use anyhow::Context;
use billspc_core::PcConfig;
use billspc_server::{api, logging, runtime};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PcConfig::load().context("loading configuration")?;
    logging::init(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        local_name = %config.peripheral.local_name,
        "Starting billspc-server"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .context("invalid server bind address")?;

    let runtime = runtime::start(config).await?;
    let app = api::create_router(runtime.state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(radio) = runtime.radio {
        radio.abort();
    }
    runtime.driver.abort();
    info!("billspc-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for Ctrl-C");
        return;
    }
    info!("Shutdown signal received");
}
