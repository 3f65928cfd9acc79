//! Shared domain types for Launchpad.
//!
//! This crate contains the domain types used across the workspace: workflow
//! definitions, trigger events, run results, pipeline events, global
//! configuration and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod run;
pub mod secret;
pub mod workflow;
