//! Global configuration types for Launchpad.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls where
//! workflows live, how secrets are looked up and default step limits.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.launchpad/config.toml`. All fields have defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Directory scanned by `launchpad list` (relative paths resolve
    /// against the data directory).
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,

    /// Timeout applied to steps that declare none (None = unbounded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_step_timeout_secs: Option<u64>,

    /// Resolve secrets from environment variables.
    #[serde(default = "default_true")]
    pub include_env_secrets: bool,

    /// Resolve secrets from the OS keychain.
    #[serde(default)]
    pub use_keychain: bool,

    /// Keychain service name for stored secrets.
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,

    /// Capacity of the run event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from("workflows")
}

fn default_true() -> bool {
    true
}

fn default_keychain_service() -> String {
    "launchpad".to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            workflows_dir: default_workflows_dir(),
            default_step_timeout_secs: None,
            include_env_secrets: default_true(),
            use_keychain: false,
            keychain_service: default_keychain_service(),
            event_capacity: default_event_capacity(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
