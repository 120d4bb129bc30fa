//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default cap on request bodies for file uploads (1 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1 << 30;

/// Default CORS allowed origin.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

// ============================================================================
// Storage Constants
// ============================================================================

pub const DEFAULT_REF_DIR: &str = "data/references";
pub const DEFAULT_UPLOAD_DIR: &str = "data/uploads";
pub const DEFAULT_JOBS_DIR: &str = "data/jobs";
pub const DEFAULT_DATABASE_CONFIG_PATH: &str = "data/databases.yaml";

// ============================================================================
// Queue Constants
// ============================================================================

/// Default number of concurrent workers.
pub const DEFAULT_QUEUE_WORKERS: usize = 4;

/// Default maximum connections in the queue's PostgreSQL pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimap2 executable.
pub const DEFAULT_MINIMAP2_PATH: &str = "minimap2";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub queue: QueueConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Where files and job records live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub reference_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub jobs_dir: PathBuf,
    pub metadata_path: PathBuf,
}

/// External aligner locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory holding the BLAST+ binaries; `None` resolves them through `PATH`
    pub blast_bin_dir: Option<PathBuf>,
    pub minimap2_path: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            blast_bin_dir: None,
            minimap2_path: PathBuf::from(DEFAULT_MINIMAP2_PATH),
        }
    }
}

/// Which broker carries jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// apalis in-memory storage with in-process workers
    Local,
    /// apalis storage in PostgreSQL
    Postgres,
}

impl std::str::FromStr for QueueBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "memory" => Ok(QueueBackend::Local),
            "postgres" | "postgresql" => Ok(QueueBackend::Postgres),
            other => Err(anyhow::anyhow!("Invalid queue backend: {}", other)),
        }
    }
}

/// Queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub workers: usize,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("SEQALIGN_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("SEQALIGN_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("SEQALIGN_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                max_upload_bytes: std::env::var("SEQALIGN_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
            },
            storage: StorageConfig {
                reference_dir: env_path("REF_DIR", DEFAULT_REF_DIR),
                upload_dir: env_path("UPLOAD_DIR", DEFAULT_UPLOAD_DIR),
                jobs_dir: env_path("JOBS_DIR", DEFAULT_JOBS_DIR),
                metadata_path: env_path("DATABASE_CONFIG_PATH", DEFAULT_DATABASE_CONFIG_PATH),
            },
            tools: ToolsConfig {
                blast_bin_dir: std::env::var("BLAST_BIN_DIR")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from),
                minimap2_path: env_path("MINIMAP2_PATH", DEFAULT_MINIMAP2_PATH),
            },
            queue: QueueConfig {
                backend: match std::env::var("QUEUE_BACKEND") {
                    Ok(value) => value.parse()?,
                    Err(_) => QueueBackend::Local,
                },
                workers: std::env::var("QUEUE_WORKERS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_QUEUE_WORKERS),
                database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.queue.workers == 0 {
            anyhow::bail!("QUEUE_WORKERS must be greater than 0");
        }

        if self.queue.backend == QueueBackend::Postgres {
            if self.queue.database_url.is_none() {
                anyhow::bail!("DATABASE_URL is required when QUEUE_BACKEND=postgres");
            }
            if self.queue.max_connections == 0 {
                anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
            }
        }

        Ok(())
    }

    /// Get server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "SEQALIGN_PORT",
        "QUEUE_BACKEND",
        "QUEUE_WORKERS",
        "DATABASE_URL",
        "REF_DIR",
        "BLAST_BIN_DIR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::load().unwrap();

        assert_eq!(config.server_address(), "127.0.0.1:8000");
        assert_eq!(config.queue.backend, QueueBackend::Local);
        assert_eq!(config.queue.workers, DEFAULT_QUEUE_WORKERS);
        assert_eq!(config.storage.reference_dir, PathBuf::from(DEFAULT_REF_DIR));
        assert!(config.tools.blast_bin_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("SEQALIGN_PORT", "9100");
        std::env::set_var("REF_DIR", "/srv/refs");
        std::env::set_var("BLAST_BIN_DIR", "/opt/blast/bin");

        let config = Config::load().unwrap();
        clear_env();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.reference_dir, PathBuf::from("/srv/refs"));
        assert_eq!(config.tools.blast_bin_dir, Some(PathBuf::from("/opt/blast/bin")));
    }

    #[test]
    #[serial]
    fn test_postgres_backend_requires_database_url() {
        clear_env();
        std::env::set_var("QUEUE_BACKEND", "postgres");

        let result = Config::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_zero_workers_rejected() {
        clear_env();
        std::env::set_var("QUEUE_WORKERS", "0");

        let result = Config::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_queue_backend_from_str() {
        assert_eq!("Postgres".parse::<QueueBackend>().unwrap(), QueueBackend::Postgres);
        assert_eq!("local".parse::<QueueBackend>().unwrap(), QueueBackend::Local);
        assert!("redis".parse::<QueueBackend>().is_err());
    }
}
