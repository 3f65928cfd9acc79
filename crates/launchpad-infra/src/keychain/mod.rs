//! OS keychain secret provider (`keyring`).
//!
//! Every secret is one keychain entry: the service is configurable
//! (`keychain_service` in config.toml) and the account is the secret name.

use launchpad_core::repository::secret::SecretProvider;
use launchpad_types::error::SecretError;

pub const DEFAULT_SERVICE: &str = "launchpad";

#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service: String,
}

impl KeychainProvider {
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry, SecretError> {
        keyring::Entry::new(&self.service, name).map_err(|e| keychain_error("open", e))
    }
}

impl Default for KeychainProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a keyring failure. Locked or missing platform stores surface as
/// `ProviderUnavailable` so the chain can report them distinctly.
fn keychain_error(op: &str, err: keyring::Error) -> SecretError {
    match err {
        keyring::Error::NoEntry => SecretError::NotFound,
        keyring::Error::NoStorageAccess(inner) | keyring::Error::PlatformFailure(inner) => {
            SecretError::ProviderUnavailable(format!("keychain {op}: {inner}"))
        }
        other => SecretError::StorageError(format!("keychain {op}: {other}")),
    }
}

impl SecretProvider for KeychainProvider {
    fn name(&self) -> &str {
        "keychain"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(keychain_error("read", err)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| keychain_error("write", e))
    }

    async fn delete(&self, key: &str) -> Result<(), SecretError> {
        self.entry(key)?
            .delete_credential()
            .map_err(|e| keychain_error("delete", e))
    }
}
