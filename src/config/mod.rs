use garde::Validate;
use serde::Deserialize;
use std::time::Duration;

use crate::models::job::Quality;

#[derive(Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the reconciler.
    #[serde(default = "default_bind_addr")]
    #[garde(length(min = 1))]
    pub bind_addr: String,

    /// Redis connection string for the metadata store
    #[garde(length(min = 1))]
    pub redis_url: String,

    /// Base URL of the compression API, without a trailing endpoint
    #[serde(default = "default_api_url")]
    #[garde(length(min = 1))]
    pub api_url: String,

    /// Static API key sent as `X-API-Key`
    #[garde(length(min = 1))]
    pub api_key: String,

    /// Submit newly created video/image objects automatically
    #[serde(default = "default_true")]
    #[garde(skip)]
    pub auto_compress: bool,

    /// Quality used for automatic submissions
    #[serde(default)]
    #[garde(skip)]
    pub default_quality: Quality,

    #[serde(default = "default_submit_timeout")]
    #[garde(range(min = 1, max = 600))]
    pub submit_timeout_secs: u64,

    #[serde(default = "default_query_timeout")]
    #[garde(range(min = 1, max = 600))]
    pub query_timeout_secs: u64,

    /// Seconds between reconciliation ticks
    #[serde(default = "default_reconcile_interval")]
    #[garde(range(min = 1))]
    pub reconcile_interval_secs: u64,

    /// Maximum number of outstanding jobs polled per tick
    #[serde(default = "default_batch_size")]
    #[garde(range(min = 1, max = 1000))]
    pub reconcile_batch_size: usize,

    /// Jobs polled concurrently within a tick (1 keeps polling sequential)
    #[serde(default = "default_workers")]
    #[garde(range(min = 1, max = 64))]
    pub reconcile_workers: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_api_url() -> String {
    "https://api.trendss.net/api".to_string()
}

fn default_true() -> bool {
    true
}

fn default_submit_timeout() -> u64 {
    30
}

fn default_query_timeout() -> u64 {
    15
}

fn default_reconcile_interval() -> u64 {
    3600
}

fn default_batch_size() -> usize {
    50
}

fn default_workers() -> usize {
    1
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            submit_timeout: Duration::from_secs(self.submit_timeout_secs),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            interval: Duration::from_secs(self.reconcile_interval_secs),
            batch_size: self.reconcile_batch_size,
            workers: self.reconcile_workers,
        }
    }
}

/// Connection settings for the compression API, passed explicitly to the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub submit_timeout: Duration,
    pub query_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            submit_timeout: Duration::from_secs(default_submit_timeout()),
            query_timeout: Duration::from_secs(default_query_timeout()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub interval: Duration,
    pub batch_size: usize,
    pub workers: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(default_reconcile_interval()),
            batch_size: default_batch_size(),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
