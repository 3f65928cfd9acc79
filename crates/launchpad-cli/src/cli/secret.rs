//! `launchpad secret`: manage values in the secrets file or OS keychain.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use console::style;
use dialoguer::Password;
use secrecy::ExposeSecret;
use serde_json::json;

use launchpad_core::service::secret::SecretStore;
use launchpad_infra::filesystem::secrets_path;
use launchpad_infra::keychain::KeychainProvider;
use launchpad_infra::secret::FileSecretProvider;
use launchpad_types::error::SecretError;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum SecretCommand {
    /// Store a secret (prompts when no value is given).
    Set {
        key: String,
        value: Option<String>,
        /// Store in the OS keychain instead of the secrets file.
        #[arg(long)]
        keychain: bool,
    },

    /// Show a stored secret, masked.
    Get {
        key: String,
        #[arg(long)]
        keychain: bool,
    },

    /// Remove a stored secret.
    #[command(alias = "rm")]
    Delete {
        key: String,
        #[arg(long)]
        keychain: bool,
    },
}

/// The writable store a command targets.
fn target_store(state: &AppState, keychain: bool) -> (SecretStore, &'static str) {
    if keychain {
        let provider = KeychainProvider::with_service(state.config.keychain_service.clone());
        (SecretStore::single(provider), "keychain")
    } else {
        let provider = FileSecretProvider::new(secrets_path(&state.data_dir));
        (SecretStore::single(provider), "secrets file")
    }
}

pub async fn handle_secret(state: &AppState, command: SecretCommand, json: bool) -> Result<()> {
    match command {
        SecretCommand::Set {
            key,
            value,
            keychain,
        } => {
            let value = match value {
                Some(value) => value,
                None => Password::new()
                    .with_prompt(format!("Value for {key}"))
                    .interact()
                    .context("Failed to read secret value")?,
            };
            if value.is_empty() {
                bail!("Secret value must not be empty");
            }

            let (store, location) = target_store(state, keychain);
            store
                .set_secret(&key, &value)
                .await
                .with_context(|| format!("Failed to store '{key}' in the {location}"))?;
            tracing::info!(key = %key, location, "secret stored");

            if json {
                println!("{}", json!({ "key": key, "stored": true, "location": location }));
            } else {
                println!("  {} Stored {} in the {location}.", style("✓").green().bold(), style(&key).cyan());
            }
        }

        SecretCommand::Get { key, keychain } => {
            let (store, location) = target_store(state, keychain);
            let Some(value) = store
                .get_secret(&key)
                .await
                .with_context(|| format!("Failed to read '{key}' from the {location}"))?
            else {
                bail!("Secret '{key}' not found in the {location}");
            };
            let masked = SecretStore::mask_secret(value.expose_secret());

            if json {
                println!("{}", json!({ "key": key, "value": masked, "location": location }));
            } else {
                println!("  {} = {}", style(&key).cyan(), masked);
            }
        }

        SecretCommand::Delete { key, keychain } => {
            let (store, location) = target_store(state, keychain);
            match store.delete_secret(&key).await {
                Ok(()) => {}
                Err(SecretError::NotFound) => bail!("Secret '{key}' not found in the {location}"),
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed to delete '{key}'"));
                }
            }
            tracing::info!(key = %key, location, "secret deleted");

            if json {
                println!("{}", json!({ "key": key, "deleted": true, "location": location }));
            } else {
                println!("  {} Deleted {}.", style("✓").green().bold(), style(&key).cyan());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_types::config::GlobalConfig;

    fn state_in(dir: &std::path::Path) -> AppState {
        let file = FileSecretProvider::new(secrets_path(dir));
        AppState {
            data_dir: dir.to_path_buf(),
            config: GlobalConfig::default(),
            secrets: SecretStore::single(file),
            config_fallback: None,
        }
    }

    #[tokio::test]
    async fn set_then_delete_in_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let set = SecretCommand::Set {
            key: "NPM_TOKEN".to_string(),
            value: Some("npm_abcdef123456".to_string()),
            keychain: false,
        };
        handle_secret(&state, set, true).await.unwrap();
        let stored = state.secrets.get_secret("NPM_TOKEN").await.unwrap();
        assert!(stored.is_some());

        let delete = SecretCommand::Delete {
            key: "NPM_TOKEN".to_string(),
            keychain: false,
        };
        handle_secret(&state, delete, true).await.unwrap();
        assert!(state.secrets.get_secret("NPM_TOKEN").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_missing_secret_fails() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let get = SecretCommand::Get {
            key: "NOPE".to_string(),
            keychain: false,
        };
        let err = handle_secret(&state, get, true).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn empty_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let set = SecretCommand::Set {
            key: "EMPTY".to_string(),
            value: Some(String::new()),
            keychain: false,
        };
        assert!(handle_secret(&state, set, true).await.is_err());
    }
}
