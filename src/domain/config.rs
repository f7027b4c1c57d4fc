//! Configuration models.
//!
//! Pacing, periodic sync, remote gateway and path settings. Every field has
//! a serde default so a partial `config.toml` is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Batch pacing for a single export pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Records per batch; also the page size requested from the remote.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Lower bound of the inter-batch delay in seconds.
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,

    /// Upper bound of the inter-batch delay in seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl ExportConfig {
    /// Inter-batch delay bounds.
    #[must_use]
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_secs_f64(self.min_delay_secs),
            Duration::from_secs_f64(self.max_delay_secs),
        )
    }
}

const fn default_batch_size() -> u32 {
    100
}

const fn default_min_delay() -> f64 {
    1.0
}

const fn default_max_delay() -> f64 {
    3.0
}

/// Periodic sync cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Floor applied to any requested interval, in seconds.
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    /// Upper bound (exclusive) of the random jitter added to each wait.
    #[serde(default = "default_max_jitter")]
    pub max_jitter_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval(),
            max_jitter_secs: default_max_jitter(),
        }
    }
}

const fn default_min_interval() -> u64 {
    300 // 5 minutes
}

const fn default_max_jitter() -> u64 {
    30
}

/// Remote gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the MTProto HTTP gateway.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

const fn default_timeout() -> u64 {
    60
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Where the opaque session token is stored.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// Output directory for quick exports.
    #[serde(default = "default_quick_dir")]
    pub quick_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
            quick_dir: default_quick_dir(),
        }
    }
}

fn default_session_file() -> PathBuf {
    PathBuf::from(".session")
}

fn default_quick_dir() -> PathBuf {
    PathBuf::from("exports/quick")
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tg-export")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Reject settings the scheduler cannot honor.
    ///
    /// # Errors
    /// Returns a configuration error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.export.batch_size == 0 {
            return Err(AppError::config("export.batch_size must be at least 1"));
        }

        let (min, max) = (self.export.min_delay_secs, self.export.max_delay_secs);
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(AppError::config(format!(
                "export delay bounds must satisfy 0 <= min_delay_secs <= max_delay_secs (got {min}..{max})"
            )));
        }

        if self.remote.base_url.trim().is_empty() {
            return Err(AppError::config("remote.base_url must not be empty"));
        }

        Ok(())
    }
}
