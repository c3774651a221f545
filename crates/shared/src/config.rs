//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Blob store configuration.
    pub blobstore: BlobStoreConfig,
    /// Reconciler configuration.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Blob store configuration (remote image CDN REST API).
#[derive(Debug, Clone, Deserialize)]
pub struct BlobStoreConfig {
    /// Base endpoint of the file management API, e.g. `https://api.example.com/v1/files`.
    pub endpoint: String,
    /// Static private API key, sent as the basic-auth username.
    pub private_key: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

/// Reconciler configuration.
///
/// Defaults match the production cadence: reconcile every minute, audit the
/// dead-letter store every 15 days, prune it daily.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds between reconciliation passes.
    #[serde(default = "default_reconcile_tick")]
    pub reconcile_tick_secs: u64,
    /// Seconds between audit passes over the dead-letter store.
    #[serde(default = "default_audit_tick")]
    pub audit_tick_secs: u64,
    /// Seconds between retention sweeps of the dead-letter store.
    #[serde(default = "default_retention_tick")]
    pub retention_tick_secs: u64,
    /// Remote delete attempts before a record is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Days a dead-letter entry is kept before the retention sweep forgets it.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Maximum number of records reconciled concurrently within one pass.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_reconcile_tick() -> u64 {
    60
}

fn default_audit_tick() -> u64 {
    60 * 60 * 24 * 15 // 15 days
}

fn default_retention_tick() -> u64 {
    60 * 60 * 24 // daily
}

fn default_max_retries() -> u32 {
    3
}

fn default_retention_days() -> i64 {
    60
}

fn default_concurrency() -> usize {
    8
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            reconcile_tick_secs: default_reconcile_tick(),
            audit_tick_secs: default_audit_tick(),
            retention_tick_secs: default_retention_tick(),
            max_retries: default_max_retries(),
            retention_days: default_retention_days(),
            concurrency: default_concurrency(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("PRISM").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciler_defaults() {
        let cfg = ReconcilerConfig::default();
        assert_eq!(cfg.reconcile_tick_secs, 60);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retention_days, 60);
        assert_eq!(cfg.audit_tick_secs, 60 * 60 * 24 * 15);
        assert_eq!(cfg.retention_tick_secs, 60 * 60 * 24);
        assert!(cfg.concurrency > 0);
    }
}
