//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database (MySQL).
    pub source: SourceConfig,

    /// Destination database (PostgreSQL).
    pub target: TargetConfig,

    /// Destination schema name. Absent: derived uniquely from the source
    /// database name.
    #[serde(default)]
    pub schema: Option<String>,

    /// Target encoding. Only UTF-8 is supported.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Target chunk size in MB (default 10, floored at 1).
    #[serde(default)]
    pub data_chunk_size: Option<f64>,

    /// When true, skip constraints, foreign keys and views.
    #[serde(default)]
    pub data_only: bool,

    /// Parallel table workers (default 1).
    #[serde(default)]
    pub workers: Option<usize>,

    /// Working directory; created at startup and removed on clean exit.
    #[serde(default)]
    pub temp_dir_path: Option<PathBuf>,

    /// Logs directory (default `logs`).
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Effective chunk target in MB.
    pub fn chunk_target_mb(&self) -> f64 {
        self.data_chunk_size.unwrap_or(10.0).max(1.0)
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or(1).max(1)
    }

    /// Effective logs directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"))
    }
}

/// Source database (MySQL) connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Destination database (PostgreSQL) connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_pg_port() -> u16 {
    5432
}

fn default_require() -> String {
    "require".to_string()
}
