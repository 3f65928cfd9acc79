//! Secret store: resolves secret names through a chain of providers.
//!
//! The store is the explicit handle passed into `PipelineRunner::run`. The
//! runner never reads secrets from ambient process state; whether the
//! environment participates is decided when the chain is assembled.

use std::collections::HashMap;
use std::sync::Arc;

use launchpad_types::error::SecretError;
use secrecy::SecretString;

use crate::repository::secret::{DynSecretProvider, SecretProvider};

/// Resolved secret values for one run, keyed by name.
pub type SecretMap = HashMap<String, SecretString>;

/// Outcome of resolving a set of names: either every value, or the names
/// no provider knew.
#[derive(Debug)]
pub enum Resolution {
    Resolved(SecretMap),
    Missing(Vec<String>),
}

/// Chain of secret providers, ordered by precedence (first match wins).
#[derive(Clone, Default)]
pub struct SecretStore {
    providers: Vec<DynSecretProvider>,
}

impl SecretStore {
    /// Create a store with the given provider chain (highest priority first).
    pub fn new(providers: Vec<DynSecretProvider>) -> Self {
        Self { providers }
    }

    /// Convenience constructor for a single concrete provider.
    pub fn single<P: SecretProvider + 'static>(provider: P) -> Self {
        Self::new(vec![Arc::new(provider)])
    }

    /// Names of the providers in resolution order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve a secret value by iterating through providers in priority order.
    pub async fn get_secret(&self, key: &str) -> Result<Option<SecretString>, SecretError> {
        for provider in &self.providers {
            if let Some(value) = provider.get_boxed(key).await? {
                tracing::trace!(secret = key, provider = provider.name(), "secret resolved");
                return Ok(Some(SecretString::from(value)));
            }
        }
        Ok(None)
    }

    /// Whether any provider knows the name. The value is dropped immediately.
    pub async fn contains(&self, key: &str) -> Result<bool, SecretError> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// Resolve every name, all or nothing.
    ///
    /// Missing names are collected rather than failing on the first one so
    /// callers can report the full list. Provider errors abort immediately.
    pub async fn resolve_all<'a, I>(&self, names: I) -> Result<Resolution, SecretError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = SecretMap::new();
        let mut missing = Vec::new();

        for name in names {
            if resolved.contains_key(name) || missing.iter().any(|m| m == name) {
                continue;
            }
            match self.get_secret(name).await? {
                Some(value) => {
                    resolved.insert(name.to_string(), value);
                }
                None => missing.push(name.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Resolution::Resolved(resolved))
        } else {
            Ok(Resolution::Missing(missing))
        }
    }

    /// Store a secret value in the first writable provider.
    ///
    /// Read-only providers (e.g. environment variables) are skipped.
    pub async fn set_secret(&self, key: &str, value: &str) -> Result<(), SecretError> {
        for provider in &self.providers {
            match provider.set_boxed(key, value).await {
                Ok(()) => return Ok(()),
                Err(SecretError::ReadOnly) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(SecretError::ProviderUnavailable(
            "no writable secret provider available".to_string(),
        ))
    }

    /// Delete a secret from every provider that has it.
    pub async fn delete_secret(&self, key: &str) -> Result<(), SecretError> {
        let mut deleted = false;

        for provider in &self.providers {
            match provider.delete_boxed(key).await {
                Ok(()) => deleted = true,
                Err(SecretError::NotFound | SecretError::ReadOnly) => continue,
                Err(e) => return Err(e),
            }
        }

        if deleted {
            Ok(())
        } else {
            Err(SecretError::NotFound)
        }
    }

    /// Mask a secret for display: `****` plus the last four characters.
    /// Values of four characters or fewer are fully masked.
    pub fn mask_secret(value: &str) -> String {
        let count = value.chars().count();
        if count <= 4 {
            "****".to_string()
        } else {
            let tail: String = value.chars().skip(count - 4).collect();
            format!("****{tail}")
        }
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("providers", &self.provider_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::secret::MemorySecretProvider;
    use secrecy::ExposeSecret;

    struct ReadOnlyProvider;

    impl SecretProvider for ReadOnlyProvider {
        fn name(&self) -> &str {
            "read-only"
        }

        async fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
            Ok((key == "SHADOWED").then(|| "from-read-only".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), SecretError> {
            Err(SecretError::ReadOnly)
        }

        async fn delete(&self, _key: &str) -> Result<(), SecretError> {
            Err(SecretError::ReadOnly)
        }
    }

    fn chain() -> SecretStore {
        SecretStore::new(vec![
            Arc::new(ReadOnlyProvider),
            Arc::new(MemorySecretProvider::with_secrets([
                ("SHADOWED", "from-memory"),
                ("DEPLOY_KEY", "ssh-key"),
            ])),
        ])
    }

    #[tokio::test]
    async fn first_provider_wins() {
        let store = chain();
        let value = store.get_secret("SHADOWED").await.unwrap().unwrap();
        assert_eq!(value.expose_secret(), "from-read-only");
        let value = store.get_secret("DEPLOY_KEY").await.unwrap().unwrap();
        assert_eq!(value.expose_secret(), "ssh-key");
    }

    #[tokio::test]
    async fn resolve_all_collects_every_missing_name() {
        let store = chain();
        let resolution = store
            .resolve_all(["DEPLOY_KEY", "A", "B", "A"])
            .await
            .unwrap();
        match resolution {
            Resolution::Missing(names) => assert_eq!(names, vec!["A", "B"]),
            Resolution::Resolved(_) => panic!("expected missing names"),
        }
    }

    #[tokio::test]
    async fn resolve_all_returns_values() {
        let store = chain();
        let resolution = store.resolve_all(["DEPLOY_KEY"]).await.unwrap();
        let Resolution::Resolved(map) = resolution else {
            panic!("expected resolved secrets");
        };
        assert_eq!(map["DEPLOY_KEY"].expose_secret(), "ssh-key");
    }

    #[tokio::test]
    async fn set_skips_read_only_providers() {
        let store = chain();
        store.set_secret("NEW", "value").await.unwrap();
        assert!(store.contains("NEW").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let store = chain();
        assert!(matches!(
            store.delete_secret("NOPE").await,
            Err(SecretError::NotFound)
        ));
    }

    #[test]
    fn debug_lists_provider_names_only() {
        let debug = format!("{:?}", chain());
        assert!(debug.contains("read-only"));
        assert!(!debug.contains("ssh-key"));
    }

    #[test]
    fn mask_secret_shows_last_four() {
        assert_eq!(SecretStore::mask_secret("abc"), "****");
        assert_eq!(SecretStore::mask_secret("sk-ant-123456"), "****3456");
        assert_eq!(SecretStore::mask_secret("pässwörtl"), "****örtl");
    }
}
