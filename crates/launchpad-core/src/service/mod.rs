//! Services composed from repository ports.

pub mod secret;
