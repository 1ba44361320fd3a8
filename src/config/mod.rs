/// Configuration management
///
/// Handles server binding, database location, and worker tuning. Every
/// field has an environment-variable override for container deployment.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g. "0.0.0.0")
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL; `sqlite::memory:` works for tests
    pub url: String,
}

/// Worker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent job slots in this worker process
    pub slots: usize,
    /// Queue poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("NEXUSFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("NEXUSFLOW_PORT")
                    .unwrap_or_else(|_| "3001".to_string())
                    .parse()
                    .unwrap_or(3001),
            },
            database: DatabaseConfig {
                url: std::env::var("NEXUSFLOW_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/nexusflow.db?mode=rwc".to_string()),
            },
            worker: WorkerConfig {
                slots: std::env::var("NEXUSFLOW_WORKER_SLOTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(4),
                poll_interval_ms: std::env::var("NEXUSFLOW_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(250),
            },
        }
    }
}
