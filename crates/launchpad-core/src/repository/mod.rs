//! Port definitions implemented by the infrastructure layer.
//!
//! The core crate never depends on any specific secret backend.

pub mod secret;
