//! Application state shared by the CLI commands.
//!
//! Resolves the data directory, loads `config.toml` and assembles the secret
//! chain once per process.

use std::path::PathBuf;

use launchpad_core::service::secret::SecretStore;
use launchpad_infra::config::{ConfigError, load_global_config};
use launchpad_infra::filesystem::{resolve_data_dir, workflows_dir};
use launchpad_infra::secret::build_secret_chain;
use launchpad_types::config::GlobalConfig;

pub struct AppState {
    pub data_dir: PathBuf,
    pub config: GlobalConfig,
    pub secrets: SecretStore,
    /// Why `config` holds defaults despite a `config.toml` being present.
    pub config_fallback: Option<ConfigError>,
}

impl AppState {
    pub async fn init() -> Self {
        Self::init_in(resolve_data_dir()).await
    }

    /// Runs before tracing is installed, so it logs nothing itself; call
    /// [`AppState::log_startup`] afterwards.
    pub async fn init_in(data_dir: PathBuf) -> Self {
        let loaded = load_global_config(&data_dir).await;
        let secrets = build_secret_chain(&loaded.config, &data_dir);
        Self {
            data_dir,
            config: loaded.config,
            secrets,
            config_fallback: loaded.fallback,
        }
    }

    pub fn log_startup(&self) {
        if let Some(err) = &self.config_fallback {
            tracing::warn!(error = %err, "falling back to default configuration");
        }
        tracing::debug!(
            data_dir = %self.data_dir.display(),
            providers = ?self.secrets.provider_names(),
            "application state ready"
        );
    }

    pub fn workflows_dir(&self) -> PathBuf {
        workflows_dir(&self.data_dir, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_config_keeps_the_reason_for_later_logging() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "use_keychain = maybe").unwrap();

        let state = AppState::init_in(tmp.path().to_path_buf()).await;

        assert!(matches!(state.config_fallback, Some(ConfigError::Parse { .. })));
        assert!(!state.config.use_keychain);
        assert_eq!(state.data_dir, tmp.path());
        state.log_startup();
    }

    #[tokio::test]
    async fn valid_config_has_no_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "event_capacity = 32").unwrap();

        let state = AppState::init_in(tmp.path().to_path_buf()).await;

        assert!(state.config_fallback.is_none());
        assert_eq!(state.config.event_capacity, 32);
        assert_eq!(state.workflows_dir(), tmp.path().join("workflows"));
    }
}
