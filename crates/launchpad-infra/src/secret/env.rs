//! Environment variable secret provider.
//!
//! A read-only provider and the highest-priority entry in the default chain.
//!
//! Key resolution: first `LAUNCHPAD_SECRET_{KEY}` (with `-` and `.` mapped to
//! `_`), then `KEY` directly.

use launchpad_core::repository::secret::SecretProvider;
use launchpad_types::error::SecretError;

/// Prefix for namespaced secret variables.
pub const ENV_PREFIX: &str = "LAUNCHPAD_SECRET_";

/// Environment variable secret provider.
///
/// `set()` and `delete()` return `SecretError::ReadOnly` because environment
/// variables cannot be persistently modified.
#[derive(Debug)]
pub struct EnvSecretProvider {
    prefix: Option<String>,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self {
            prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Look up names verbatim only, without the namespaced form.
    pub fn unprefixed() -> Self {
        Self { prefix: None }
    }

    fn prefixed_key(&self, key: &str) -> Option<String> {
        let prefix = self.prefix.as_deref()?;
        let normalized: String = key
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        Some(format!("{prefix}{normalized}"))
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn read_var(name: &str) -> Option<String> {
    // Non-unicode values are treated as absent; secrets must be valid strings.
    std::env::var(name).ok()
}

impl SecretProvider for EnvSecretProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        if let Some(value) = self.prefixed_key(key).as_deref().and_then(read_var) {
            return Ok(Some(value));
        }
        Ok(read_var(key))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), SecretError> {
        Err(SecretError::ReadOnly)
    }

    async fn delete(&self, _key: &str) -> Result<(), SecretError> {
        Err(SecretError::ReadOnly)
    }
}
