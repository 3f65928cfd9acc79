//! Secret provider trait definition.
//!
//! Follows the blanket-impl pattern used for dynamic dispatch:
//! 1. `SecretProvider` uses RPITIT async methods (not object safe)
//! 2. `SecretProviderDyn` is the object-safe mirror with boxed futures
//! 3. `DynSecretProvider` is the shared handle stored in a `SecretStore` chain

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use launchpad_types::error::SecretError;

/// Trait for secret storage backends (memory, environment, file, keychain).
pub trait SecretProvider: Send + Sync {
    /// Short name used in logs and diagnostics (never a value).
    fn name(&self) -> &str;

    /// Retrieve a secret value by name.
    /// Returns None if the secret does not exist in this provider.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, SecretError>> + Send;

    /// Store a secret value. Read-only providers return `SecretError::ReadOnly`.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), SecretError>> + Send;

    /// Delete a secret.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), SecretError>> + Send;
}

type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SecretError>> + Send + 'a>>;

/// Object-safe version of [`SecretProvider`] with boxed futures.
pub trait SecretProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn get_boxed<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, Option<String>>;

    fn set_boxed<'a>(&'a self, key: &'a str, value: &'a str) -> BoxedFuture<'a, ()>;

    fn delete_boxed<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, ()>;
}

impl<T: SecretProvider> SecretProviderDyn for T {
    fn name(&self) -> &str {
        SecretProvider::name(self)
    }

    fn get_boxed<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, Option<String>> {
        Box::pin(self.get(key))
    }

    fn set_boxed<'a>(&'a self, key: &'a str, value: &'a str) -> BoxedFuture<'a, ()> {
        Box::pin(self.set(key, value))
    }

    fn delete_boxed<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, ()> {
        Box::pin(self.delete(key))
    }
}

/// Type-erased provider handle used to build resolution chains.
pub type DynSecretProvider = Arc<dyn SecretProviderDyn>;

/// In-process secret provider backed by a map.
///
/// Useful for embedding the runner in another program and for tests.
#[derive(Default)]
pub struct MemorySecretProvider {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = secrets
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    fn poisoned() -> SecretError {
        SecretError::StorageError("memory secret map lock poisoned".to_string())
    }
}

impl SecretProvider for MemorySecretProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        let values = self.values.read().map_err(|_| Self::poisoned())?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        let mut values = self.values.write().map_err(|_| Self::poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SecretError> {
        let mut values = self.values.write().map_err(|_| Self::poisoned())?;
        values.remove(key).map(|_| ()).ok_or(SecretError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_provider_roundtrip() {
        let provider = MemorySecretProvider::new();
        provider.set("TOKEN", "abc").await.unwrap();
        assert_eq!(provider.get("TOKEN").await.unwrap(), Some("abc".to_string()));

        provider.delete("TOKEN").await.unwrap();
        assert!(provider.get("TOKEN").await.unwrap().is_none());
        assert!(matches!(
            provider.delete("TOKEN").await,
            Err(SecretError::NotFound)
        ));
    }

    #[tokio::test]
    async fn dyn_provider_delegates() {
        let provider: DynSecretProvider =
            Arc::new(MemorySecretProvider::with_secrets([("KEY", "v")]));
        assert_eq!(provider.name(), "memory");
        assert_eq!(provider.get_boxed("KEY").await.unwrap(), Some("v".to_string()));
    }
}
