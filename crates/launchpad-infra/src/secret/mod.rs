//! Secret provider implementations.
//!
//! - `env` -- read-only environment variable lookup
//! - `file` -- TOML table at `{data_dir}/secrets.toml`
//! - `chain` -- assembles providers into a `SecretStore` in priority order
//!
//! The OS keychain provider lives in [`crate::keychain`].

pub mod chain;
pub mod env;
pub mod file;

pub use chain::build_secret_chain;
pub use env::EnvSecretProvider;
pub use file::FileSecretProvider;
