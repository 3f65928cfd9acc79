//! `command` action: run an arbitrary shell command.

use launchpad_core::pipeline::adapter::{AdapterOutput, StepAdapter, StepInvocation};
use launchpad_types::error::AdapterError;

use super::process::{ensure_dir, run_shell};

/// Runs `with.run` through `sh -c` in the step's working directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandAdapter;

impl StepAdapter for CommandAdapter {
    fn action(&self) -> &str {
        "command"
    }

    async fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Result<AdapterOutput, AdapterError> {
        let command = invocation.params.require("run")?;
        ensure_dir(invocation.working_dir).await?;

        let output = run_shell(invocation, command, invocation.working_dir).await?;
        if !output.success() {
            return Err(AdapterError::Command {
                detail: output.failure_detail(invocation.masker()),
                exit_code: output.exit_code,
            });
        }

        let last_line = output
            .stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| invocation.masker().mask(l.trim()));
        Ok(AdapterOutput {
            exit_code: output.exit_code,
            summary: last_line,
        })
    }
}
