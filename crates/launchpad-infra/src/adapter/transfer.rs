//! `transfer` action: copy build output to a remote host over ssh/scp.
//!
//! The remote directory is created first (`ssh host mkdir -p`), then the
//! source is copied recursively with `scp -r`. A private key given as a
//! parameter (normally a secret reference) is written to a private temp file
//! for the duration of the attempt.

use std::io::Write;
use std::path::{Component, Path};

use launchpad_core::pipeline::adapter::{AdapterOutput, StepAdapter, StepInvocation};
use launchpad_types::error::AdapterError;

use super::process::run_process;
use super::{contained_path, parse_number};

pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Default, Clone, Copy)]
pub struct TransferAdapter;

/// Resolved commands for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub mkdir_args: Vec<String>,
    pub scp_args: Vec<String>,
    /// `host:path` (with `user@` when given).
    pub destination: String,
}

/// Remote path for `source` under `target`, dropping the first
/// `strip_components` path components of `source`.
///
/// Without stripping, the source is copied into `target` as-is.
pub fn remote_path(
    target: &str,
    source: &str,
    strip_components: Option<usize>,
) -> Result<String, AdapterError> {
    let Some(strip) = strip_components else {
        return Ok(target.to_string());
    };
    let parts: Vec<String> = Path::new(source)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if strip >= parts.len() {
        return Err(AdapterError::invalid_parameter(
            "strip_components",
            format!("source '{source}' has only {} path components", parts.len()),
        ));
    }
    Ok(format!(
        "{}/{}",
        target.trim_end_matches('/'),
        parts[strip..].join("/")
    ))
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl TransferAdapter {
    pub fn plan(
        invocation: &StepInvocation<'_>,
        key_file: Option<&Path>,
    ) -> Result<TransferPlan, AdapterError> {
        let params = invocation.params;
        let source = params.require("source")?;
        let host = params.require("host")?;
        let target = params.require("target")?;
        let port: u16 = parse_number("port", params.get("port"))?.unwrap_or(DEFAULT_SSH_PORT);
        let strip: Option<usize> = parse_number("strip_components", params.get("strip_components"))?;
        contained_path(invocation.working_dir, "source", source)?;

        let remote = remote_path(target, source, strip)?;
        let remote_dir = match strip {
            // scp -r creates the final component itself
            Some(_) => Path::new(&remote)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| target.to_string()),
            None => remote.clone(),
        };
        let login = match params.get("user").filter(|u| !u.is_empty()) {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        };

        let mut common = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(key) = key_file {
            common.push("-i".to_string());
            common.push(key.to_string_lossy().into_owned());
        }

        let mut mkdir_args = common.clone();
        mkdir_args.extend([
            "-p".to_string(),
            port.to_string(),
            login.clone(),
            format!("mkdir -p {}", shell_quote(&remote_dir)),
        ]);

        let destination = format!("{login}:{remote}");
        let mut scp_args = common;
        scp_args.extend([
            "-r".to_string(),
            "-P".to_string(),
            port.to_string(),
            source.to_string(),
            destination.clone(),
        ]);

        Ok(TransferPlan {
            mkdir_args,
            scp_args,
            destination,
        })
    }
}

fn write_key_file(key: &str) -> Result<tempfile::NamedTempFile, AdapterError> {
    let failure = |e: std::io::Error| AdapterError::Transfer {
        detail: format!("cannot prepare private key: {}", e.kind()),
        exit_code: None,
    };
    // NamedTempFile is created with mode 0600
    let mut file = tempfile::NamedTempFile::new().map_err(failure)?;
    file.write_all(key.as_bytes()).map_err(failure)?;
    if !key.ends_with('\n') {
        file.write_all(b"\n").map_err(failure)?;
    }
    file.flush().map_err(failure)?;
    Ok(file)
}

impl StepAdapter for TransferAdapter {
    fn action(&self) -> &str {
        "transfer"
    }

    async fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Result<AdapterOutput, AdapterError> {
        let key_file = match invocation.params.get("key").filter(|k| !k.is_empty()) {
            Some(key) => Some(write_key_file(key)?),
            None => None,
        };
        let plan = Self::plan(invocation, key_file.as_ref().map(|f| f.path()))?;
        let masker = invocation.masker();

        let mkdir = run_process(invocation, "ssh", &plan.mkdir_args, invocation.working_dir).await?;
        if !mkdir.success() {
            return Err(AdapterError::Transfer {
                detail: format!("remote mkdir failed: {}", mkdir.failure_detail(masker)),
                exit_code: mkdir.exit_code,
            });
        }

        let copy = run_process(invocation, "scp", &plan.scp_args, invocation.working_dir).await?;
        if !copy.success() {
            return Err(AdapterError::Transfer {
                detail: copy.failure_detail(masker),
                exit_code: copy.exit_code,
            });
        }

        let source = invocation.params.get_or("source", "");
        Ok(AdapterOutput::exited(0)
            .with_summary(masker.mask(&format!("copied {source} to {}", plan.destination))))
    }
}
