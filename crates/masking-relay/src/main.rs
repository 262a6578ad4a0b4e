//! SMS Masking Relay - Main entry point.

mod config;
mod error;

use crate::config::Config;
use crate::error::AppResult;
use anyhow::Context;
use masking_engine::api::{create_router, ApiState};
use masking_engine::{spawn_retrier, spawn_sweeper};
use record_store::{MemoryStore, RecordStore};
use sms_client::{HttpSmsClient, SmsTransport};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.relay.log_level);

    info!("Starting SMS Masking Relay...");

    // The bundled in-memory store; swap in a RecordStore implementation
    // backed by a real database for durable deployments.
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());

    let transport: Arc<dyn SmsTransport> = Arc::new(HttpSmsClient::new(
        &config.sms.base_url,
        &config.sms.account_sid,
        &config.sms.auth_token,
        config.sms.send_timeout,
    )?);

    // Health checks
    if transport.health_check().await {
        info!("SMS provider healthy - {}", config.sms.base_url);
    } else {
        warn!("SMS provider health check failed - sends will fall back to the retrier");
    }

    // Background workers
    let sweeper_handle = spawn_sweeper(store.clone(), &config.masking);
    let retrier_handle = spawn_retrier(store.clone(), transport.clone(), &config.masking);
    info!(
        "Background workers started (deallocation every {:?}, fallback every {:?})",
        config.masking.sweep_interval, config.masking.retry_interval
    );

    // HTTP surface
    let state = Arc::new(ApiState::new(store, transport, &config.masking));
    let router = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    sweeper_handle.abort();
    retrier_handle.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
