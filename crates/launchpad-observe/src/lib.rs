//! Observability setup for Launchpad binaries.

pub mod tracing_setup;
