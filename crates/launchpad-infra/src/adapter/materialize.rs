//! `materialize-secret` action: write a secret value to a file.
//!
//! Typical use is producing a `.env` or key file from a single secret.
//! The value itself never reaches logs, summaries or error details.

use launchpad_core::pipeline::adapter::{AdapterOutput, StepAdapter, StepInvocation};
use launchpad_types::error::AdapterError;

use super::contained_path;
use crate::filesystem::write_private;

/// Default file mode for materialized secrets.
pub const DEFAULT_MODE: u32 = 0o600;

#[derive(Debug, Default, Clone, Copy)]
pub struct MaterializeSecretAdapter;

fn parse_mode(raw: Option<&str>) -> Result<u32, AdapterError> {
    match raw {
        None => Ok(DEFAULT_MODE),
        Some(raw) => u32::from_str_radix(raw.trim().trim_start_matches("0o"), 8)
            .ok()
            .filter(|mode| *mode <= 0o777)
            .ok_or_else(|| {
                AdapterError::invalid_parameter("mode", format!("'{raw}' is not an octal file mode"))
            }),
    }
}

impl StepAdapter for MaterializeSecretAdapter {
    fn action(&self) -> &str {
        "materialize-secret"
    }

    async fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Result<AdapterOutput, AdapterError> {
        let relative = invocation.params.require("path")?;
        let path = contained_path(invocation.working_dir, "path", relative)?;
        let content = invocation
            .params
            .get("content")
            .ok_or_else(|| AdapterError::missing_parameter("content"))?;
        let mode = parse_mode(invocation.params.get("mode"))?;

        if !invocation.params.is_sensitive("content") {
            tracing::warn!(path = relative, "materialized content is not a secret reference");
        }

        let io_error = |action: &str, err: std::io::Error| AdapterError::Materialize {
            detail: format!("cannot {action} {relative}: {}", err.kind()),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directory for", e))?;
        }
        write_private(&path, content.as_bytes(), mode)
            .await
            .map_err(|e| io_error("write", e))?;

        tracing::debug!(path = relative, bytes = content.len(), "secret materialized");
        Ok(AdapterOutput::default().with_summary(format!(
            "wrote {} bytes to {relative}",
            content.len()
        )))
    }
}
