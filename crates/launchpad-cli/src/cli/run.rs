//! `launchpad run`: execute a workflow file with live progress output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio_util::sync::CancellationToken;

use launchpad_core::event::bus::{EventBus, RunSubscription};
use launchpad_core::pipeline::definition::load_workflow_file;
use launchpad_core::pipeline::runner::PipelineRunner;
use launchpad_infra::adapter::default_registry;
use launchpad_infra::config::default_step_timeout;
use launchpad_types::event::PipelineEvent;
use launchpad_types::run::{RunOutcome, RunResult, StepOutcome, StepResult};
use launchpad_types::workflow::{TriggerEvent, TriggerKind};

use crate::state::AppState;

/// Exit status for a run that ended in failure.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for a cancelled run (128 + SIGINT).
pub const EXIT_CANCELLED: u8 = 130;

/// Build the trigger event from `--trigger` / `--release`.
pub fn trigger_event(kind: Option<TriggerKind>, release: Option<String>) -> Result<TriggerEvent> {
    match (kind, release) {
        (Some(TriggerKind::ManualDispatch), Some(_)) => {
            bail!("--release cannot be combined with --trigger manual-dispatch")
        }
        (Some(TriggerKind::ReleasePublished), None) => {
            bail!("--trigger release-published requires --release <ID>")
        }
        (Some(TriggerKind::ReleasePublished) | None, Some(release_id)) => {
            Ok(TriggerEvent::ReleasePublished { release_id })
        }
        (Some(TriggerKind::ManualDispatch) | None, None) => Ok(TriggerEvent::ManualDispatch),
    }
}

pub fn exit_code(outcome: RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Success => ExitCode::SUCCESS,
        RunOutcome::Failure => ExitCode::from(EXIT_FAILURE),
        RunOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
    }
}

pub async fn handle_run(
    state: &AppState,
    file: &Path,
    trigger: TriggerEvent,
    workdir: PathBuf,
    json: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let definition = load_workflow_file(file)
        .with_context(|| format!("Failed to load workflow {}", file.display()))?;
    let workdir = std::path::absolute(&workdir)
        .with_context(|| format!("Invalid workspace directory {}", workdir.display()))?;

    let event_bus = EventBus::new(state.config.event_capacity);
    let events = event_bus.subscribe_next_run();
    let mut runner = PipelineRunner::new(default_registry(), workdir).with_event_bus(event_bus);
    if let Some(timeout) = default_step_timeout(&state.config) {
        runner = runner.with_default_step_timeout(timeout);
    }

    let printer = (!json && !quiet).then(|| tokio::spawn(print_progress(events)));

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "  {} Cancelling after the current step (always-run steps still execute)...",
                    style("!").yellow().bold()
                );
                cancel.cancel();
            }
        }
    });

    let result = runner
        .run_with_cancel(&definition, trigger, &state.secrets, cancel)
        .await;
    interrupt.abort();
    // Dropping the runner closes the channel for runs that never started.
    drop(runner);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let result = result.with_context(|| format!("Workflow '{}' did not start", definition.name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        print_summary(&result);
    }

    Ok(exit_code(result.outcome))
}

async fn print_progress(mut events: RunSubscription) {
    while let Some(event) = events.next().await {
        match event {
            PipelineEvent::RunStarted {
                workflow,
                trigger,
                total_steps,
                ..
            } => {
                println!();
                println!(
                    "  {} Running {} ({trigger}, {total_steps} steps)",
                    style("▶").cyan().bold(),
                    style(workflow).cyan()
                );
                println!();
            }
            PipelineEvent::StepStarted {
                step, always_run, ..
            } => {
                let marker = if always_run { " (always)" } else { "" };
                println!("  {} {}{}", style(">").blue(), style(step).bold(), style(marker).dim());
            }
            PipelineEvent::AttemptFailed {
                attempt,
                error,
                will_retry,
                ..
            } => {
                let next = if will_retry { ", retrying" } else { "" };
                println!(
                    "    {} attempt {attempt} failed{next}: {}",
                    style("!").yellow(),
                    style(error).dim()
                );
            }
            PipelineEvent::StepFinished {
                step,
                outcome,
                duration_ms,
                ..
            } => {
                let mark = match outcome {
                    StepOutcome::Success => style("ok").green(),
                    StepOutcome::Failure => style("failed").red(),
                    StepOutcome::Skipped => style("skipped").dim(),
                };
                println!("    {step}: {mark} in {}", format_duration(duration_ms));
            }
            PipelineEvent::StepSkipped { step, reason, .. } => {
                println!("  {} {step} skipped: {reason}", style("-").dim());
            }
            PipelineEvent::CancelRequested { .. } => {
                println!("  {} run cancelled", style("!").yellow().bold());
            }
            PipelineEvent::RunFinished { .. } => {}
        }
    }
}

fn print_summary(result: &RunResult) {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Outcome"),
            Cell::new("Attempts"),
            Cell::new("Duration"),
            Cell::new("Detail"),
        ]);

    for step in &result.steps {
        table.add_row(vec![
            Cell::new(&step.name),
            format_outcome(step.outcome),
            Cell::new(step.attempts),
            Cell::new(format_duration(step.duration_ms)),
            Cell::new(step_detail(step)),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    let elapsed = (result.finished_at - result.started_at).num_milliseconds().max(0) as u64;
    match result.outcome {
        RunOutcome::Success => println!(
            "  {} {} succeeded in {}",
            style("✓").green().bold(),
            style(&result.workflow).cyan(),
            format_duration(elapsed)
        ),
        RunOutcome::Failure => println!(
            "  {} {} failed at step '{}'",
            style("✗").red().bold(),
            style(&result.workflow).cyan(),
            result.root_cause.as_deref().unwrap_or("?")
        ),
        RunOutcome::Cancelled => println!(
            "  {} {} cancelled",
            style("!").yellow().bold(),
            style(&result.workflow).cyan()
        ),
    }
    println!("  Run: {}", style(result.run_id).dim());
    println!();
}

fn format_outcome(outcome: StepOutcome) -> Cell {
    match outcome {
        StepOutcome::Success => Cell::new("success").fg(Color::Green),
        StepOutcome::Failure => Cell::new("failure").fg(Color::Red),
        StepOutcome::Skipped => Cell::new("skipped").fg(Color::DarkGrey),
    }
}

fn step_detail(step: &StepResult) -> String {
    match (&step.error, &step.summary) {
        (Some(err), _) => err.to_string(),
        (None, Some(summary)) => summary.clone(),
        (None, None) => String::new(),
    }
}

pub fn format_duration(ms: u64) -> String {
    match ms {
        0..1_000 => format!("{ms}ms"),
        1_000..60_000 => format!("{:.1}s", ms as f64 / 1000.0),
        _ => format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_flag_implies_release_trigger() {
        let event = trigger_event(None, Some("v1.0.0".to_string())).unwrap();
        assert_eq!(
            event,
            TriggerEvent::ReleasePublished {
                release_id: "v1.0.0".to_string()
            }
        );
        assert_eq!(trigger_event(None, None).unwrap(), TriggerEvent::ManualDispatch);
    }

    #[test]
    fn conflicting_trigger_flags_are_rejected() {
        assert!(trigger_event(Some(TriggerKind::ReleasePublished), None).is_err());
        assert!(trigger_event(Some(TriggerKind::ManualDispatch), Some("v1".to_string())).is_err());
    }

    #[test]
    fn exit_codes_follow_outcome() {
        assert_eq!(exit_code(RunOutcome::Success), ExitCode::SUCCESS);
        assert_eq!(exit_code(RunOutcome::Failure), ExitCode::from(1));
        assert_eq!(exit_code(RunOutcome::Cancelled), ExitCode::from(130));
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1_500), "1.5s");
        assert_eq!(format_duration(125_000), "2m05s");
    }
}
