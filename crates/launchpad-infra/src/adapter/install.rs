//! `install` action: install project dependencies with npm.

use std::path::Path;

use launchpad_core::pipeline::adapter::{AdapterOutput, StepAdapter, StepInvocation};
use launchpad_types::error::AdapterError;

use super::process::run_shell;

/// Installs dependencies in the step's working directory.
///
/// Without an explicit `command`, uses `npm ci` when a `package-lock.json`
/// is present and `npm install` otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstallAdapter;

impl InstallAdapter {
    pub fn default_command(dir: &Path) -> &'static str {
        if dir.join("package-lock.json").is_file() {
            "npm ci"
        } else {
            "npm install"
        }
    }
}

impl StepAdapter for InstallAdapter {
    fn action(&self) -> &str {
        "install"
    }

    async fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Result<AdapterOutput, AdapterError> {
        let dir = invocation.working_dir;
        if !dir.join("package.json").is_file() {
            return Err(AdapterError::Install {
                detail: format!("no package.json in {}", dir.display()),
                exit_code: None,
            });
        }

        let command = match invocation.params.get("command").filter(|c| !c.trim().is_empty()) {
            Some(command) => command.to_string(),
            None => Self::default_command(dir).to_string(),
        };

        let output = run_shell(invocation, &command, dir).await?;
        if !output.success() {
            return Err(AdapterError::Install {
                detail: output.failure_detail(invocation.masker()),
                exit_code: output.exit_code,
            });
        }

        Ok(AdapterOutput::exited(0).with_summary(invocation.masker().mask(&command)))
    }
}
