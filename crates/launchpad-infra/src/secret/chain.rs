//! Secret chain builder: wires concrete providers in priority order.
//!
//! This module lives in `launchpad-infra` because it assembles concrete
//! provider implementations. The resulting chain is wrapped in a
//! `SecretStore` from `launchpad-core`.
//!
//! Default chain order: `[EnvSecretProvider, FileSecretProvider, KeychainProvider]`

use std::path::Path;
use std::sync::Arc;

use launchpad_core::repository::secret::DynSecretProvider;
use launchpad_core::service::secret::SecretStore;
use launchpad_types::config::GlobalConfig;

use crate::filesystem::secrets_path;
use crate::keychain::KeychainProvider;
use crate::secret::env::EnvSecretProvider;
use crate::secret::file::FileSecretProvider;

/// Build the default secret store for a data directory.
///
/// The chain is ordered by precedence (first match wins):
/// 1. Environment variables (if `include_env_secrets`)
/// 2. `{data_dir}/secrets.toml` (always included)
/// 3. OS keychain (if `use_keychain`)
pub fn build_secret_chain(config: &GlobalConfig, data_dir: &Path) -> SecretStore {
    let mut chain: Vec<DynSecretProvider> = Vec::new();

    if config.include_env_secrets {
        chain.push(Arc::new(EnvSecretProvider::new()));
    }

    chain.push(Arc::new(FileSecretProvider::new(secrets_path(data_dir))));

    if config.use_keychain {
        chain.push(Arc::new(KeychainProvider::with_service(
            config.keychain_service.clone(),
        )));
    }

    let store = SecretStore::new(chain);
    tracing::debug!(providers = ?store.provider_names(), "secret chain assembled");
    store
}
