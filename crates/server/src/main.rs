//! KeyProofs server binary.

use anyhow::{Context, Result};
use clap::Parser;
use keyproofs_core::AppConfig;
use keyproofs_resolver::{DnsResolver, HickoryDns, HttpKeyLookup, KeyLookup};
use keyproofs_server::{create_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// KeyProofs - decentralized identity proof verification
#[derive(Parser, Debug)]
#[command(name = "keyproofsd")]
#[command(version, about, long_about = None)]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    let _args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("KeyProofs v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env().context("failed to load configuration")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let keys: Arc<dyn KeyLookup> = Arc::new(HttpKeyLookup::new(http.clone()));
    let dns: Arc<dyn DnsResolver> = Arc::new(HickoryDns::from_system());

    let state = AppState::new(config.clone(), http, keys, dns)
        .context("failed to prepare data directories")?;
    let app = create_router(state.clone());

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    tracing::info!(listen = %addr, base_url = %config.base_url(), "startup");

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::warn!("shutting down, interrupt received");
            shutdown_state.shutdown();
        })
        .await?;

    tracing::info!("shutdown");
    Ok(())
}
