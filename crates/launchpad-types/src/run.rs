//! Run result types: per-step outcomes and the ordered run summary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StepError;
use crate::workflow::TriggerEvent;

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

/// Terminal outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Success => write!(f, "success"),
            StepOutcome::Failure => write!(f, "failure"),
            StepOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one executed (or skipped) step. Only the final attempt is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name matching `StepSpec.name`.
    pub name: String,
    pub outcome: StepOutcome,
    /// Process exit status reported by the adapter, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Attempts made (0 for skipped steps).
    pub attempts: u32,
    /// Wall time across all attempts.
    pub duration_ms: u64,
    /// Short adapter-provided summary on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Failure detail from the final attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

impl StepResult {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: StepOutcome::Skipped,
            exit_code: None,
            attempts: 0,
            duration_ms: 0,
            summary: None,
            error: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == StepOutcome::Failure
    }
}

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
    Cancelled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "success"),
            RunOutcome::Failure => write!(f, "failure"),
            RunOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Ordered summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// UUIDv7 run ID.
    pub run_id: Uuid,
    pub workflow: String,
    pub trigger: TriggerEvent,
    pub outcome: RunOutcome,
    /// Step results in declaration order.
    pub steps: Vec<StepResult>,
    /// Name of the first step that failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// The result of the step that caused the failure.
    pub fn root_cause_step(&self) -> Option<&StepResult> {
        self.root_cause.as_deref().and_then(|name| self.step(name))
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;

    fn failed(name: &str) -> StepResult {
        StepResult {
            name: name.to_string(),
            outcome: StepOutcome::Failure,
            exit_code: Some(1),
            attempts: 1,
            duration_ms: 5,
            summary: None,
            error: Some(StepError::Execution {
                step_name: name.to_string(),
                cause: AdapterError::Command {
                    detail: "exit 1".to_string(),
                    exit_code: Some(1),
                },
            }),
        }
    }

    #[test]
    fn root_cause_step_lookup() {
        let result = RunResult {
            run_id: Uuid::nil(),
            workflow: "deploy".to_string(),
            trigger: TriggerEvent::ManualDispatch,
            outcome: RunOutcome::Failure,
            steps: vec![StepResult::skipped("a"), failed("b")],
            root_cause: Some("b".to_string()),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert_eq!(result.root_cause_step().unwrap().name, "b");
        assert_eq!(result.step_names(), vec!["a", "b"]);
        assert!(!result.succeeded());
    }

    #[test]
    fn skipped_result_has_no_attempts() {
        let r = StepResult::skipped("notify");
        assert_eq!(r.outcome, StepOutcome::Skipped);
        assert_eq!(r.attempts, 0);
        assert!(!r.is_failure());
    }

    #[test]
    fn outcome_display() {
        assert_eq!(RunOutcome::Cancelled.to_string(), "cancelled");
        assert_eq!(StepOutcome::Skipped.to_string(), "skipped");
    }
}
