//! `fetch` action: clone the source repository with git.

use launchpad_core::pipeline::adapter::{AdapterOutput, StepAdapter, StepInvocation};
use launchpad_types::error::AdapterError;

use super::process::{ensure_dir, run_process};
use super::{contained_path, parse_number};

/// Clones `with.repository` into `with.path` (git's default directory when
/// omitted), optionally at `ref` with a shallow `depth`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchAdapter;

impl FetchAdapter {
    /// Arguments for `git`.
    pub fn clone_args(invocation: &StepInvocation<'_>) -> Result<Vec<String>, AdapterError> {
        let params = invocation.params;
        let repository = params.require("repository")?;
        let depth: Option<u32> = parse_number("depth", params.get("depth"))?;

        let mut args = vec!["clone".to_string(), "--quiet".to_string()];
        match depth {
            Some(0) => return Err(AdapterError::invalid_parameter("depth", "must be > 0")),
            Some(depth) => args.extend(["--depth".to_string(), depth.to_string()]),
            None => {}
        }
        if let Some(reference) = params.get("ref").filter(|r| !r.is_empty()) {
            args.extend(["--branch".to_string(), reference.to_string()]);
        }
        args.push("--".to_string());
        args.push(repository.to_string());
        if let Some(path) = params.get("path").filter(|p| !p.is_empty()) {
            contained_path(invocation.working_dir, "path", path)?;
            args.push(path.to_string());
        }
        Ok(args)
    }
}

impl StepAdapter for FetchAdapter {
    fn action(&self) -> &str {
        "fetch"
    }

    async fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Result<AdapterOutput, AdapterError> {
        let args = Self::clone_args(invocation)?;
        ensure_dir(invocation.working_dir).await?;

        let output = run_process(invocation, "git", &args, invocation.working_dir).await?;
        if !output.success() {
            return Err(AdapterError::Fetch {
                detail: output.failure_detail(invocation.masker()),
                exit_code: output.exit_code,
            });
        }

        let repository = invocation.masker().mask(invocation.params.get_or("repository", ""));
        let summary = match invocation.params.get("ref") {
            Some(reference) => format!("cloned {repository} at {reference}"),
            None => format!("cloned {repository}"),
        };
        Ok(AdapterOutput::exited(0).with_summary(summary))
    }
}
