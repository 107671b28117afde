//! Dealerdesk Gateway - storage grant API
//!
//! This binary serves the upload/download grant endpoints. Credentials are
//! read from the environment (see `dealerdesk_common::config`).

use anyhow::Result;
use clap::Parser;
use dealerdesk_broker::{BrokerSettings, BrokerState, DOWNLOAD_PATH, UPLOAD_PATH};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dealerdesk-gateway")]
#[command(about = "Dealerdesk object storage grant API")]
#[command(version)]
struct Args {
    /// Listen address
    #[arg(short, long, env = "DEALERDESK_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Identity provider JWKS URL (defaults to Google Secure Token keys)
    #[arg(long, env = "DEALERDESK_JWKS_URL")]
    jwks_url: Option<String>,

    /// Build the token verifier and storage signer at startup and exit on misconfiguration
    #[arg(long, default_value_t = false)]
    eager_init: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| args.log_level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Dealerdesk Gateway");

    let state = Arc::new(BrokerState::from_process_env(BrokerSettings {
        jwks_url: args.jwks_url.clone(),
    }));

    if args.eager_init {
        state
            .warm_up()
            .await
            .map_err(|e| anyhow::anyhow!("Startup initialization failed: {}", e))?;
        info!("Token verifier and storage signer initialized");
    } else {
        info!("Token verifier and storage signer will initialize on first request");
    }

    let app = dealerdesk_broker::router(state).layer(TraceLayer::new_for_http());
    info!("Upload grants: POST {}", UPLOAD_PATH);
    info!("Download grants: POST {}", DOWNLOAD_PATH);

    // Parse listen address
    let addr: SocketAddr = args
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", args.listen, e))?;

    info!("Starting grant API server on {}", addr);

    // Start server
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("Gateway shut down gracefully");

    Ok(())
}
