//! Pipeline engine and port definitions for Launchpad.
//!
//! This crate defines the step adapter and secret provider traits (the
//! "ports") and the pipeline runner that drives them. It depends only on
//! `launchpad-types` -- never on `launchpad-infra` or any process/network
//! crate.

pub mod event;
pub mod pipeline;
pub mod repository;
pub mod service;
