//! meshnamed - gossip-replicated nameserver daemon
//!
//! Maintains this peer's authoritative hostname bindings, replicates them
//! across the overlay, and reaps expired tombstones in the background.

use clap::Parser;
use meshnamed::config::Config;
use meshnamed::db::SledStore;
use meshnamed::nameserver::Nameserver;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration
    let config = Config::parse();
    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    // Initialize logging
    let default_level = if config.verbose {
        "meshnamed=debug"
    } else {
        "meshnamed=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(default_level.parse().unwrap());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    info!(
        "meshnamed v{} - peer {}",
        env!("CARGO_PKG_VERSION"),
        config.peer_name
    );

    let store = match SledStore::open(&config.data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("failed to open journal at {:?}: {}", config.data_dir, e);
            return ExitCode::FAILURE;
        }
    };

    // Without a mesh connection every origin is treated as known; the
    // mesh supplies the real liveness check when it binds.
    let nameserver = match Nameserver::new(config.peer_name, store, Arc::new(|_| true)) {
        Ok(ns) => Arc::new(ns),
        Err(e) => {
            error!("failed to restore nameserver state: {}", e);
            return ExitCode::FAILURE;
        }
    };

    nameserver.start();
    let stats = nameserver.stats();
    info!(
        "nameserver running with {} entries ({} tombstoned, {} stopped)",
        stats.total, stats.tombstones, stats.stopped
    );

    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
    nameserver.stop();

    ExitCode::SUCCESS
}
