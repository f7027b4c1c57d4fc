//! Configuration file management.
//!
//! Handles loading and saving the TOML configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# tg-export configuration
# Auto-generated - edit as needed

[export]
# Messages per batch (also the page size requested from the remote)
batch_size = 100

# Random delay between batches, in seconds
min_delay_secs = 1.0
max_delay_secs = 3.0

[sync]
# Floor for `sync --every`, in seconds (default: 300 = 5 minutes)
min_interval_secs = 300

# Random jitter added to every sync wait, in seconds
max_jitter_secs = 30

[remote]
# MTProto HTTP gateway
base_url = "http://127.0.0.1:8081"
timeout_secs = 60

[paths]
session_file = ".session"
quick_dir = "exports/quick"
"#;

/// Load configuration from an explicit path, the default path, or defaults.
///
/// An explicit path must exist; the default path is optional.
///
/// # Errors
/// Returns error if a file exists but cannot be read, parsed, or validated.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) => load_config_from_file(path)?,
        None => {
            let path = config_file_path();
            if path.exists() {
                load_config_from_file(&path)?
            } else {
                AppConfig::default()
            }
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    tracing::debug!(path = %path.display(), "Loaded configuration");

    toml::from_str(&content).map_err(|e| AppError::config(format!("Failed to parse config file: {e}")))
}

/// Save configuration to a file.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| AppError::config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write config file: {}", path.display()), e))?;

    tracing::info!(path = %path.display(), "Configuration saved");

    Ok(())
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns `true` when a new file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}

/// Get the path to the default configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_config_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.export.batch_size, 100);
        assert_eq!(config.sync.min_interval_secs, 300);
        assert_eq!(config.paths.quick_dir, PathBuf::from("exports/quick"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("[export]\nbatch_size = 50\n").unwrap();
        assert_eq!(config.export.batch_size, 50);
        assert!((config.export.max_delay_secs - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.sync.max_jitter_secs, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.sync.min_interval_secs = 600;
        save_config(&config, &config_path).unwrap();

        let loaded = load_config(Some(&config_path)).unwrap();
        assert_eq!(loaded.sync.min_interval_secs, 600);
        assert_eq!(loaded.export.batch_size, config.export.batch_size);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_ensure_config_exists_writes_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub/config.toml");

        assert!(ensure_config_exists(&path).unwrap());
        assert!(!ensure_config_exists(&path).unwrap());
        assert!(load_config_from_file(&path).is_ok());
    }
}
