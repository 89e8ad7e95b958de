use std::sync::Arc;
use tracing::info;

mod aggregate;
mod bus;
mod commands;
mod config;
mod enrich;
mod entity;
mod live;
mod model;
mod notify;
mod portal;
mod store;
#[cfg(test)]
mod testutil;
mod view;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("NeoCare portal starting...");

    let config = config::Config::from_env()?;

    let bus = Arc::new(bus::EventBus::new());

    info!("Initializing store at {}", config.db_path.display());
    let store = store::Store::new(&config.db_path, bus.clone()).await?;
    store.init().await?;

    let portal = portal::server::PortalServer::new(store, bus, config.clone());
    let app = portal.router();

    info!("Starting portal server on port {}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                info!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
