//! File-backed secret provider.
//!
//! Secrets live in a flat TOML table (`name = "value"`), by default at
//! `{data_dir}/secrets.toml`. The file is re-read on every lookup so edits
//! take effect without a restart. Writes keep the file at mode 0600.

use std::path::{Path, PathBuf};

use launchpad_core::repository::secret::SecretProvider;
use launchpad_types::error::SecretError;
use toml::{Table, Value};

use crate::filesystem::write_private;

#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    path: PathBuf,
}

impl FileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Table, SecretError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(err) => {
                return Err(SecretError::ProviderUnavailable(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        // Parse errors never include file content.
        content.parse::<Table>().map_err(|_| {
            SecretError::StorageError(format!("{} is not a valid TOML table", self.path.display()))
        })
    }

    async fn store(&self, table: &Table) -> Result<(), SecretError> {
        let storage = |err: std::io::Error| {
            SecretError::StorageError(format!("failed to write {}: {err}", self.path.display()))
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage)?;
        }
        let content = toml::to_string(table)
            .map_err(|e| SecretError::StorageError(format!("failed to encode secrets: {e}")))?;
        write_private(&self.path, content.as_bytes(), 0o600)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

impl SecretProvider for FileSecretProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        let table = self.load().await?;
        match table.get(key) {
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(SecretError::StorageError(format!(
                "secret '{key}' in {} is not a string",
                self.path.display()
            ))),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        let mut table = self.load().await?;
        table.insert(key.to_string(), Value::String(value.to_string()));
        self.store(&table).await?;
        tracing::debug!(secret = key, path = %self.path.display(), "secret stored in file");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SecretError> {
        let mut table = self.load().await?;
        if table.remove(key).is_none() {
            return Err(SecretError::NotFound);
        }
        self.store(&table).await
    }
}
