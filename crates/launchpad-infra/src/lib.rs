//! Infrastructure layer for Launchpad.
//!
//! Contains implementations of the ports defined in `launchpad-core`: the
//! concrete step adapters (git, npm, scp, release registration, shell),
//! secret providers (environment, file, OS keychain), and the config and
//! data directory helpers.

pub mod adapter;
pub mod config;
pub mod filesystem;
pub mod keychain;
pub mod secret;
