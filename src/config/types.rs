//! Configuration types.

use crate::backoff::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub moves: MovesConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}

/// HTTP server and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for non-API paths (the browser client). Optional.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Session lifetime in days (default: 30).
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u32,

    /// Mark the session cookie `Secure; SameSite=None` (for HTTPS deployments).
    #[serde(default)]
    pub cookie_secure: bool,

    /// Include database and internal error details in 500 responses.
    #[serde(default)]
    pub expose_internal_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
            static_dir: None,
            session_ttl_days: default_session_ttl_days(),
            cookie_secure: false,
            expose_internal_errors: false,
        }
    }
}

impl ServerConfig {
    /// Session lifetime in seconds, for the cookie `Max-Age`.
    pub fn session_max_age_secs(&self) -> i64 {
        i64::from(self.session_ttl_days) * 24 * 60 * 60
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("eisenhower/board.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_session_ttl_days() -> u32 {
    30
}

/// Batched quadrant move queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovesConfig {
    /// How long to collect moves after the first one arrives (default: 200).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum moves written per transaction (default: 200).
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Attempts per batch before it is dropped (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial retry delay in milliseconds (default: 250).
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    /// Exponential backoff multiplier (default: 2.0).
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Maximum retry delay in milliseconds (default: 5000).
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

impl Default for MovesConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_batch: default_max_batch(),
            max_attempts: default_max_attempts(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl MovesConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_ms: self.retry_initial_ms,
            multiplier: self.retry_multiplier,
            max_ms: self.retry_max_ms,
            jitter_ms: 0,
        }
    }
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_max_batch() -> usize {
    200
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_initial_ms() -> u64 {
    250
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_max_ms() -> u64 {
    5_000
}
