//! `build` action: run the project's build script.

use launchpad_core::pipeline::adapter::{AdapterOutput, StepAdapter, StepInvocation};
use launchpad_types::error::AdapterError;

use super::process::run_shell;

/// Runs `with.command`, defaulting to `npm run <target>` (target `build`).
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildAdapter;

impl BuildAdapter {
    pub fn command_line(invocation: &StepInvocation<'_>) -> String {
        match invocation.params.get("command").filter(|c| !c.trim().is_empty()) {
            Some(command) => command.to_string(),
            None => format!("npm run {}", invocation.params.get_or("target", "build")),
        }
    }
}

impl StepAdapter for BuildAdapter {
    fn action(&self) -> &str {
        "build"
    }

    async fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Result<AdapterOutput, AdapterError> {
        if !invocation.working_dir.is_dir() {
            return Err(AdapterError::Build {
                detail: format!(
                    "working directory {} does not exist",
                    invocation.working_dir.display()
                ),
                exit_code: None,
            });
        }

        let command = Self::command_line(invocation);
        let output = run_shell(invocation, &command, invocation.working_dir).await?;
        if !output.success() {
            return Err(AdapterError::Build {
                detail: output.failure_detail(invocation.masker()),
                exit_code: output.exit_code,
            });
        }

        Ok(AdapterOutput::exited(0).with_summary(invocation.masker().mask(&command)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::Harness;
    use launchpad_types::workflow::StepSpec;

    #[tokio::test]
    async fn default_command_runs_npm_target() {
        let tmp = tempfile::tempdir().unwrap();
        let harness = Harness::new(
            StepSpec::new("build", "build").param("target", "build:prod"),
            &[],
            tmp.path(),
        )
        .await;
        assert_eq!(
            BuildAdapter::command_line(&harness.invocation()),
            "npm run build:prod"
        );

        let plain = Harness::new(StepSpec::new("build", "build"), &[], tmp.path()).await;
        assert_eq!(BuildAdapter::command_line(&plain.invocation()), "npm run build");
    }

    #[tokio::test]
    async fn failing_build_reports_output_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let step = StepSpec::new("build", "build")
            .param("command", "echo compiling; echo 'error TS2304: x' >&2; exit 2");
        let harness = Harness::new(step, &[], tmp.path()).await;

        let err = BuildAdapter.execute(&harness.invocation()).await.unwrap_err();
        assert_eq!(
            err,
            AdapterError::Build {
                detail: "error TS2304: x".to_string(),
                exit_code: Some(2),
            }
        );
    }

    #[tokio::test]
    async fn missing_working_dir_fails_without_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        let step = StepSpec::new("build", "build")
            .working_dir("ui")
            .param("command", "true");
        let harness = Harness::new(step, &[], tmp.path()).await;

        let err = BuildAdapter.execute(&harness.invocation()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Build { exit_code: None, .. }));
    }

    #[tokio::test]
    async fn successful_build_summarizes_command() {
        let tmp = tempfile::tempdir().unwrap();
        let step = StepSpec::new("build", "build").param("command", "true");
        let harness = Harness::new(step, &[], tmp.path()).await;

        let out = BuildAdapter.execute(&harness.invocation()).await.unwrap();
        assert_eq!(out.summary.as_deref(), Some("true"));
    }
}
