//! Inventory Event Bus server.

use std::sync::Arc;

use thiserror::Error;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use inventory_event_bus::adapters::http::{app_router, AppState, PublisherKey};
use inventory_event_bus::adapters::{BrokerSettings, EventBus, JwtTokenValidator};
use inventory_event_bus::config::{AppConfig, ConfigError, ServerConfig};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate().map_err(ConfigError::from)?;

    let addr = config.server.socket_addr().map_err(ConfigError::from)?;
    let bus = Arc::new(EventBus::start(BrokerSettings::from(&config.bus)));
    let validator = Arc::new(JwtTokenValidator::from_config(&config.auth));
    let publisher_key = PublisherKey::new(config.server.publisher_key);
    if !publisher_key.is_enabled() {
        tracing::warn!("No publisher key configured; POST /api/events is open");
    }

    let app = app_router(AppState::new(bus.clone(), validator, publisher_key));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        environment = ?config.server.environment,
        "Inventory event bus listening"
    );

    // Sockets are closed by the bus before axum stops accepting, otherwise
    // graceful shutdown would wait on them forever.
    let shutdown_bus = bus.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_bus.shutdown().await;
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}
