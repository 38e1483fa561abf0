//! # Location History Server
//!
//! Entry point for the location-history gRPC service.

use location_history::{HistoryConfig, HistoryService, serve_with_listener};

use geotrack_db::open_history_log;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting location-history v{}", env!("CARGO_PKG_VERSION"));

    let config = HistoryConfig::from_env()?;
    info!("Configuration loaded");
    info!("   gRPC Port: {}", config.grpc_port);
    info!("   Storage: {:?} {:?}", config.db.backend, config.db.hosts);

    let log = open_history_log(&config.db).await?;
    let service = Arc::new(HistoryService::new(log));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.grpc_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting location history microservice on {}", addr);

    serve_with_listener(listener, service, shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,location_history=debug,geotrack_db=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}
