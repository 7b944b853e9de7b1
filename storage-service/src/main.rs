// SPDX-License-Identifier: GPL-3.0-only

//! COSMIC Ext Storage Helper - privileged command execution over D-Bus
//!
//! Started on demand by the bus when an unprivileged engine asks for it, runs
//! commands and raw block copies as root and checks Polkit on every call.

use anyhow::Result;
use clap::Parser;
use storage_contracts::{ACTION_ID, HELPER_BUS_NAME, HELPER_OBJECT_PATH};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};
use zbus::connection::Builder as ConnectionBuilder;

mod auth;
mod error;
mod helper;

use helper::HelperService;

#[derive(Debug, Parser)]
#[command(name = "cosmic-ext-storage-helper", version, about)]
struct Cli {
    /// Serve on the session bus instead of the system bus
    #[arg(long)]
    session: bool,

    /// Skip Polkit checks (only together with --session)
    #[arg(long)]
    no_polkit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to journald/stderr
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storage_service=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!(
        "Starting COSMIC Ext Storage Helper v{}",
        env!("CARGO_PKG_VERSION")
    );

    if cli.no_polkit && !cli.session {
        anyhow::bail!("--no-polkit is only allowed together with --session");
    }

    if !cli.session && !nix::unistd::geteuid().is_root() {
        tracing::error!("Storage helper must run as root");
        anyhow::bail!("Helper must run with root privileges");
    }

    if cli.no_polkit {
        tracing::warn!("Polkit checks disabled, every caller is trusted");
    }

    let shutdown = CancellationToken::new();
    let helper = HelperService::new(ACTION_ID, !cli.no_polkit, shutdown.clone());

    let builder = if cli.session {
        ConnectionBuilder::session()?
    } else {
        ConnectionBuilder::system()?
    };

    let connection = builder
        .name(HELPER_BUS_NAME)?
        .serve_at(HELPER_OBJECT_PATH, helper)?
        .build()
        .await?;

    tracing::info!("{} registered at {}", HELPER_BUS_NAME, HELPER_OBJECT_PATH);

    HelperService::announce_ready(&connection, HELPER_OBJECT_PATH).await?;
    tracing::info!("Helper ready, waiting for requests...");

    tokio::select! {
        _ = shutdown.cancelled() => tracing::info!("Exit requested over D-Bus"),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received shutdown signal");
            shutdown.cancel();
        }
    }

    // Releasing the name flushes the reply to Exit before we go away
    if let Err(e) = connection.release_name(HELPER_BUS_NAME).await {
        tracing::debug!("Failed to release {}: {}", HELPER_BUS_NAME, e);
    }

    tracing::info!("COSMIC Ext Storage Helper shutting down");
    Ok(())
}
