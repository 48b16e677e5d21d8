use compress_relay::{
    config::AppConfig,
    services::{
        compressor::CompressorClient,
        jobs::{JobRepository, INDEXED_FIELDS},
        reconcile::Reconciler,
        redis_store::RedisMetadataStore,
    },
};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting compression reconciler");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    let store = RedisMetadataStore::new(&config.redis_url, &INDEXED_FIELDS)
        .expect("Failed to initialize metadata store");
    let client =
        CompressorClient::new(config.client_config()).expect("Failed to initialize compression client");

    let reconcile_config = config.reconcile_config();
    let reconciler = Reconciler::new(
        Arc::new(client),
        JobRepository::new(Arc::new(store)),
        reconcile_config.clone(),
    );

    tracing::info!(
        interval_secs = reconcile_config.interval.as_secs(),
        batch_size = reconcile_config.batch_size,
        workers = reconcile_config.workers,
        "Reconciler ready"
    );

    let mut ticker = interval(reconcile_config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match reconciler.tick().await {
                    Ok(summary) => tracing::debug!(?summary, "Tick complete"),
                    Err(e) => tracing::error!(error = %e, "Failed to list pending jobs, will retry next tick"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping reconciler");
                break;
            }
        }
    }
}
