use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use course_dashboard::config::Config;
use course_dashboard::storage::FileStorage;
use course_dashboard::store::Store;
use course_dashboard::{AppState, init_router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let storage = FileStorage::open(&config.data_dir)
        .with_context(|| format!("Failed to open data directory {}", config.data_dir))?;
    let store = Store::open(Arc::new(storage));

    let port = config.server_port;
    let app = init_router(AppState::new(store, config));

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
