//! Pipeline engine: definition loading, run context, adapters and the runner.
//!
//! - `definition` -- YAML parsing, validation, filesystem load/save/discovery
//! - `context` -- per-run context: resolved secrets, parameters, masking
//! - `adapter` -- the step adapter port and the action registry
//! - `retry` -- retry policy for failed attempts
//! - `runner` -- sequential fail-fast runner with always-run steps

pub mod adapter;
pub mod context;
pub mod definition;
pub mod retry;
pub mod runner;
