//! Pipeline run events published on the event bus.
//!
//! Consumers (the CLI progress printer, tests) subscribe to follow a run
//! while it executes. Events never carry secret values.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run::{RunOutcome, StepOutcome};

/// An event emitted by the pipeline runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        workflow: String,
        trigger: String,
        total_steps: usize,
    },
    StepStarted {
        run_id: Uuid,
        step: String,
        index: usize,
        always_run: bool,
    },
    AttemptFailed {
        run_id: Uuid,
        step: String,
        attempt: u32,
        error: String,
        will_retry: bool,
    },
    StepFinished {
        run_id: Uuid,
        step: String,
        outcome: StepOutcome,
        duration_ms: u64,
    },
    StepSkipped {
        run_id: Uuid,
        step: String,
        reason: String,
    },
    CancelRequested {
        run_id: Uuid,
    },
    RunFinished {
        run_id: Uuid,
        workflow: String,
        outcome: RunOutcome,
        duration_ms: u64,
    },
}

impl PipelineEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            PipelineEvent::RunStarted { run_id, .. }
            | PipelineEvent::StepStarted { run_id, .. }
            | PipelineEvent::AttemptFailed { run_id, .. }
            | PipelineEvent::StepFinished { run_id, .. }
            | PipelineEvent::StepSkipped { run_id, .. }
            | PipelineEvent::CancelRequested { run_id }
            | PipelineEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_tag() {
        let event = PipelineEvent::StepSkipped {
            run_id: Uuid::nil(),
            step: "register".to_string(),
            reason: "trigger manual-dispatch not selected".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_skipped");
        assert_eq!(json["step"], "register");
        assert_eq!(event.run_id(), Uuid::nil());
    }
}
