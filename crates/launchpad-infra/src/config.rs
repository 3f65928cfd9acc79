//! Global configuration loader for Launchpad.
//!
//! Reads `config.toml` from the data directory (`~/.launchpad/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use launchpad_types::config::GlobalConfig;
use thiserror::Error;

use crate::filesystem::config_path;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Strictly read `{data_dir}/config.toml`. `Ok(None)` when the file is absent.
pub async fn read_global_config(data_dir: &Path) -> Result<Option<GlobalConfig>, ConfigError> {
    let path = config_path(data_dir);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::Parse {
                message: e.message().to_string(),
                path,
            }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read { path, source }),
    }
}

/// Configuration for the process plus the reason defaults were used, if any.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: GlobalConfig,
    /// Set when `config.toml` exists but could not be used.
    pub fallback: Option<ConfigError>,
}

/// Lenient loader used at startup: an absent, unreadable or malformed file
/// yields [`GlobalConfig::default()`]. Nothing is logged here: the caller
/// reports `fallback` once its subscriber is installed, since the config
/// decides how logs are formatted.
pub async fn load_global_config(data_dir: &Path) -> LoadedConfig {
    match read_global_config(data_dir).await {
        Ok(config) => LoadedConfig {
            config: config.unwrap_or_default(),
            fallback: None,
        },
        Err(err) => LoadedConfig {
            config: GlobalConfig::default(),
            fallback: Some(err),
        },
    }
}

/// The runner-level fallback timeout, if configured.
pub fn default_step_timeout(config: &GlobalConfig) -> Option<Duration> {
    config
        .default_step_timeout_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
