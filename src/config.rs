//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)
//!
//! The loaded [`AppConfig`] is an immutable snapshot; components receive it
//! (or the part they need) at construction time.

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub federation: FederationConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub relationships: RelationshipConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "social.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://social.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Federation feature switches
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Serve /.well-known/nodeinfo and /nodeinfo/2.0
    pub nodeinfo_enabled: bool,
    /// Serve /.well-known/webfinger and /.well-known/host-meta
    pub webfinger_enabled: bool,
    pub activitypub: ActivityPubConfig,
}

/// ActivityPub endpoint switches
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityPubConfig {
    /// Master switch for every ActivityPub endpoint
    pub enabled: bool,
    /// Per-user inbox
    pub inbox: bool,
    /// Shared inbox
    pub shared_inbox: bool,
    /// Per-user outbox
    pub outbox: bool,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries in the key-value cache
    pub max_capacity: u64,
}

/// Inbox queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Number of inbox worker tasks
    pub workers: usize,
    /// Maximum jobs held per lane before the oldest is displaced
    pub lane_capacity: usize,
    /// Largest inbox request body accepted, in bytes
    ///
    /// Larger deliveries are refused with 413 before anything is queued.
    pub max_payload_bytes: usize,
}

/// Relationship index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipConfig {
    /// Interval between full reconciliation passes (0 runs only the startup pass)
    pub reconcile_interval_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FEDIGATE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/fedigate.db")?
            .set_default("federation.nodeinfo_enabled", true)?
            .set_default("federation.webfinger_enabled", true)?
            .set_default("federation.activitypub.enabled", true)?
            .set_default("federation.activitypub.inbox", true)?
            .set_default("federation.activitypub.shared_inbox", true)?
            .set_default("federation.activitypub.outbox", true)?
            .set_default("cache.max_capacity", 100_000)?
            .set_default("queue.workers", 4)?
            .set_default("queue.lane_capacity", 10_000)?
            .set_default("queue.max_payload_bytes", 8 * 1024 * 1024)?
            .set_default("relationships.reconcile_interval_seconds", 3600)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("FEDIGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.server.domain.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "server.domain must not be empty".to_string(),
            ));
        }

        if self.queue.workers == 0 {
            return Err(crate::error::AppError::Config(
                "queue.workers must be greater than 0".to_string(),
            ));
        }

        if self.queue.lane_capacity == 0 {
            return Err(crate::error::AppError::Config(
                "queue.lane_capacity must be greater than 0".to_string(),
            ));
        }

        if self.queue.max_payload_bytes == 0 {
            return Err(crate::error::AppError::Config(
                "queue.max_payload_bytes must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error, got {:?}",
                self.logging.level
            )));
        }

        Ok(())
    }
}
