//! Pipeline runner: sequential, fail-fast step execution with always-run steps.
//!
//! # Run contract
//!
//! 1. The trigger kind must be accepted by the workflow and every step must
//!    name a registered action; otherwise nothing runs.
//! 2. Every referenced secret is resolved up front. A missing secret aborts
//!    the run before any adapter is invoked.
//! 3. Steps run one at a time in declaration order. After the first failure
//!    (or a cancellation) the remaining ordinary steps are neither run nor
//!    recorded; `always_run` steps still execute.
//! 4. Each attempt is bounded by a timeout. Failed attempts are retried up to
//!    the step's `retry` budget and only the final attempt is recorded.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use launchpad_types::error::{SecretError, StepError};
use launchpad_types::event::PipelineEvent;
use launchpad_types::run::{RunOutcome, RunResult, StepOutcome, StepResult};
use launchpad_types::workflow::{StepSpec, TriggerEvent, TriggerKind, WorkflowDefinition};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::event::bus::EventBus;
use crate::service::secret::SecretStore;

use super::adapter::{AdapterRegistry, DynStepAdapter, StepInvocation};
use super::context::RunContext;
use super::definition::{DefinitionError, validate_definition};
use super::retry::RetryHandler;

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Errors that prevent a run from starting. Step failures are not errors;
/// they are reported through `RunResult`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("workflow '{workflow}' does not accept trigger '{kind}'")]
    UnsupportedTrigger { workflow: String, kind: TriggerKind },

    #[error("step '{step}' uses unknown action '{action}'")]
    UnknownAction { step: String, action: String },

    #[error("unresolved secrets: {}", .missing.join(", "))]
    SecretResolution { missing: Vec<String> },

    #[error("secret store error: {source}")]
    SecretStore {
        #[source]
        source: SecretError,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("run not found: {0}")]
    RunNotFound(Uuid),
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Executes workflow definitions against a registry of step adapters.
pub struct PipelineRunner {
    registry: AdapterRegistry,
    event_bus: EventBus,
    workspace_root: PathBuf,
    /// Fallback per-attempt timeout; `None` leaves attempts unbounded.
    default_step_timeout: Option<Duration>,
    /// Cancellation tokens keyed by run_id.
    active_runs: DashMap<Uuid, CancellationToken>,
}

impl PipelineRunner {
    pub fn new(registry: AdapterRegistry, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            event_bus: EventBus::default(),
            workspace_root: workspace_root.into(),
            default_step_timeout: None,
            active_runs: DashMap::new(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Timeout used when neither the step nor the workflow sets one.
    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = Some(timeout);
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn workspace_root(&self) -> &std::path::Path {
        &self.workspace_root
    }

    /// Run a workflow to completion.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        trigger: TriggerEvent,
        secrets: &SecretStore,
    ) -> Result<RunResult, RunError> {
        self.run_with_cancel(definition, trigger, secrets, CancellationToken::new())
            .await
    }

    /// Run a workflow, observing `cancel` between steps and between retries.
    pub async fn run_with_cancel(
        &self,
        definition: &WorkflowDefinition,
        trigger: TriggerEvent,
        secrets: &SecretStore,
        cancel: CancellationToken,
    ) -> Result<RunResult, RunError> {
        let kind = trigger.kind();
        if !definition.accepts(kind) {
            return Err(RunError::UnsupportedTrigger {
                workflow: definition.name.clone(),
                kind,
            });
        }
        validate_definition(definition)?;
        let adapters = self.resolve_adapters(definition)?;

        let run_id = Uuid::now_v7();
        let ctx = RunContext::prepare(
            run_id,
            definition,
            trigger,
            self.workspace_root.clone(),
            secrets,
        )
        .await?;

        self.active_runs.insert(run_id, cancel.clone());
        let started_at = Utc::now();
        let run_start = Instant::now();

        self.event_bus.publish(PipelineEvent::RunStarted {
            run_id,
            workflow: definition.name.clone(),
            trigger: ctx.trigger.to_string(),
            total_steps: definition.steps.len(),
        });
        tracing::info!(
            run_id = %run_id,
            workflow = definition.name.as_str(),
            trigger = %ctx.trigger,
            "starting pipeline run"
        );

        let (steps, outcome, root_cause) = self
            .execute_steps(&ctx, definition, &adapters, &cancel)
            .instrument(tracing::info_span!("run", run_id = %run_id, workflow = %definition.name))
            .await;

        self.active_runs.remove(&run_id);
        let duration_ms = run_start.elapsed().as_millis() as u64;

        self.event_bus.publish(PipelineEvent::RunFinished {
            run_id,
            workflow: definition.name.clone(),
            outcome,
            duration_ms,
        });
        match outcome {
            RunOutcome::Success => {
                tracing::info!(run_id = %run_id, duration_ms, "pipeline run succeeded");
            }
            RunOutcome::Failure => tracing::warn!(
                run_id = %run_id,
                root_cause = root_cause.as_deref().unwrap_or_default(),
                duration_ms,
                "pipeline run failed"
            ),
            RunOutcome::Cancelled => {
                tracing::info!(run_id = %run_id, duration_ms, "pipeline run cancelled");
            }
        }

        Ok(RunResult {
            run_id,
            workflow: definition.name.clone(),
            trigger: ctx.trigger,
            outcome,
            steps,
            root_cause,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Request cancellation of an active run.
    pub fn cancel(&self, run_id: Uuid) -> Result<(), RunError> {
        match self.active_runs.get(&run_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(run_id = %run_id, "cancellation requested");
                Ok(())
            }
            None => Err(RunError::RunNotFound(run_id)),
        }
    }

    /// IDs of runs currently executing.
    pub fn active_runs(&self) -> Vec<Uuid> {
        self.active_runs.iter().map(|entry| *entry.key()).collect()
    }

    fn resolve_adapters(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<Vec<DynStepAdapter>, RunError> {
        definition
            .steps
            .iter()
            .map(|step| {
                self.registry
                    .get(&step.uses)
                    .cloned()
                    .ok_or_else(|| RunError::UnknownAction {
                        step: step.name.clone(),
                        action: step.uses.clone(),
                    })
            })
            .collect()
    }

    async fn execute_steps(
        &self,
        ctx: &RunContext,
        definition: &WorkflowDefinition,
        adapters: &[DynStepAdapter],
        cancel: &CancellationToken,
    ) -> (Vec<StepResult>, RunOutcome, Option<String>) {
        let kind = ctx.trigger.kind();
        let mut results = Vec::with_capacity(definition.steps.len());
        let mut halted = false;
        let mut cancelled = false;
        let mut root_cause: Option<String> = None;

        for (index, (step, adapter)) in definition.steps.iter().zip(adapters).enumerate() {
            if !halted && cancel.is_cancelled() {
                halted = true;
                cancelled = true;
                self.event_bus
                    .publish(PipelineEvent::CancelRequested { run_id: ctx.run_id });
                tracing::info!(next_step = step.name.as_str(), "run cancelled, halting");
            }

            if halted && !step.always_run {
                tracing::debug!(step = step.name.as_str(), "not run after halt");
                continue;
            }

            if !step.runs_for(kind) {
                self.event_bus.publish(PipelineEvent::StepSkipped {
                    run_id: ctx.run_id,
                    step: step.name.clone(),
                    reason: format!("not selected for trigger {kind}"),
                });
                results.push(StepResult::skipped(&step.name));
                continue;
            }

            let span = tracing::info_span!("step", step = %step.name, action = %step.uses);
            let result = self
                .run_step(ctx, definition, step, index, adapter, cancel)
                .instrument(span)
                .await;

            if result.is_failure() && !halted {
                halted = true;
                root_cause = Some(step.name.clone());
            }
            results.push(result);
        }

        let outcome = if root_cause.is_some() {
            RunOutcome::Failure
        } else if cancelled {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Success
        };
        (results, outcome, root_cause)
    }

    async fn run_step(
        &self,
        ctx: &RunContext,
        definition: &WorkflowDefinition,
        step: &StepSpec,
        index: usize,
        adapter: &DynStepAdapter,
        cancel: &CancellationToken,
    ) -> StepResult {
        let timeout = step
            .timeout_secs
            .or(definition.timeout_secs)
            .map(Duration::from_secs)
            .or(self.default_step_timeout);
        let env = ctx.resolve_env(step);
        let params = ctx.resolve_params(step, &env);
        let working_dir = ctx.working_dir(step);

        self.event_bus.publish(PipelineEvent::StepStarted {
            run_id: ctx.run_id,
            step: step.name.clone(),
            index,
            always_run: step.always_run,
        });
        tracing::debug!(?params, dir = %working_dir.display(), "step started");

        let started = Instant::now();
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let invocation = StepInvocation::new(ctx, step, attempt, &params, &env, &working_dir);
            let execution = adapter.execute_boxed(&invocation);
            let completed = match timeout {
                Some(limit) => tokio::time::timeout(limit, execution).await.map_err(|_| {
                    StepError::Timeout {
                        step_name: step.name.clone(),
                        timeout_secs: limit.as_secs(),
                    }
                }),
                None => Ok(execution.await),
            };
            let result = completed.and_then(|outcome| {
                outcome.map_err(|cause| StepError::Execution {
                    step_name: step.name.clone(),
                    cause,
                })
            });

            match result {
                Ok(output) => break Ok(output),
                Err(err) => {
                    let will_retry = RetryHandler::should_retry(
                        step.retry,
                        attempt,
                        cancel.is_cancelled(),
                        step.always_run,
                    );
                    let message = ctx.masker().mask(&err.to_string());
                    tracing::warn!(attempt, will_retry, error = %message, "attempt failed");
                    self.event_bus.publish(PipelineEvent::AttemptFailed {
                        run_id: ctx.run_id,
                        step: step.name.clone(),
                        attempt,
                        error: message,
                        will_retry,
                    });
                    if !will_retry {
                        break Err(err);
                    }
                }
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(output) => StepResult {
                name: step.name.clone(),
                outcome: StepOutcome::Success,
                exit_code: output.exit_code,
                attempts: attempt,
                duration_ms,
                summary: output.summary.map(|s| ctx.masker().mask(&s)),
                error: None,
            },
            Err(err) => StepResult {
                name: step.name.clone(),
                outcome: StepOutcome::Failure,
                exit_code: err.exit_code(),
                attempts: attempt,
                duration_ms,
                summary: None,
                error: Some(err.redacted(|text| ctx.masker().mask(text))),
            },
        };

        self.event_bus.publish(PipelineEvent::StepFinished {
            run_id: ctx.run_id,
            step: step.name.clone(),
            outcome: result.outcome,
            duration_ms,
        });
        tracing::info!(outcome = %result.outcome, attempts = attempt, duration_ms, "step finished");
        result
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("registry", &self.registry)
            .field("workspace_root", &self.workspace_root)
            .field("default_step_timeout", &self.default_step_timeout)
            .field("active_runs", &self.active_runs.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
