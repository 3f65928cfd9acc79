//! Launchpad CLI entry point.
//!
//! Binary name: `launchpad`
//!
//! Parses CLI arguments, loads configuration and the secret chain, then
//! dispatches to the command handler.

mod cli;
mod state;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use launchpad_observe::tracing_setup::{TracingOptions, directive_for, init_tracing, shutdown_tracing};
use launchpad_types::config::LogFormat;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "launchpad", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let state = AppState::init().await;

    let options = TracingOptions {
        default_directive: directive_for(cli.verbose, cli.quiet).to_string(),
        json: state.config.log_format == LogFormat::Json,
        enable_otel: cli.otel,
    };
    if let Err(err) = init_tracing(&options) {
        eprintln!("warning: failed to initialize tracing: {err}");
    }
    state.log_startup();

    let result = dispatch(&state, cli).await;
    shutdown_tracing();
    result
}

async fn dispatch(state: &AppState, cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run {
            file,
            trigger,
            release,
            workdir,
        } => {
            let trigger = cli::run::trigger_event(trigger, release)?;
            cli::run::handle_run(state, &file, trigger, workdir, cli.json, cli.quiet).await
        }

        Commands::Validate { file } => {
            cli::workflow::handle_validate(&file, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::List => {
            cli::workflow::handle_list(state, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Secret { action } => {
            cli::secret::handle_secret(state, action, cli.json).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}
