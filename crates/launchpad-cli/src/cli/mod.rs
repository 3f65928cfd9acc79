//! CLI command definitions and dispatch for the `launchpad` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod run;
pub mod secret;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use launchpad_types::workflow::TriggerKind;

/// Run release deployment pipelines.
#[derive(Parser)]
#[command(name = "launchpad", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "LAUNCHPAD_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow file.
    Run {
        /// Path to the workflow YAML file.
        file: PathBuf,

        /// Trigger kind (release-published or manual-dispatch).
        #[arg(long)]
        trigger: Option<TriggerKind>,

        /// Release identifier (implies --trigger release-published).
        #[arg(long)]
        release: Option<String>,

        /// Workspace root that step working directories are relative to.
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
    },

    /// Validate a workflow file without running it.
    Validate {
        /// Path to the workflow YAML file.
        file: PathBuf,
    },

    /// List workflows in the configured workflows directory.
    #[command(alias = "ls")]
    List,

    /// Manage stored secrets.
    Secret {
        #[command(subcommand)]
        action: secret::SecretCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
