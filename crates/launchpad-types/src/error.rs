use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a step adapter.
///
/// Each adapter maps its own failure modes onto one variant. The runner
/// never inspects the detail; it attaches the error to the step result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterError {
    #[error("fetch failed: {detail}")]
    Fetch {
        detail: String,
        exit_code: Option<i32>,
    },

    #[error("install failed: {detail}")]
    Install {
        detail: String,
        exit_code: Option<i32>,
    },

    #[error("secret materialization failed: {detail}")]
    Materialize { detail: String },

    #[error("build failed: {detail}")]
    Build {
        detail: String,
        exit_code: Option<i32>,
    },

    #[error("transfer failed: {detail}")]
    Transfer {
        detail: String,
        exit_code: Option<i32>,
    },

    #[error("release registration failed: {detail}")]
    Registration {
        detail: String,
        status: Option<u16>,
    },

    #[error("command failed: {detail}")]
    Command {
        detail: String,
        exit_code: Option<i32>,
    },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("failed to start '{program}': {detail}")]
    Spawn { program: String, detail: String },
}

impl AdapterError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AdapterError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::invalid_parameter(name, "required parameter is missing")
    }

    /// Rewrite every free-text field with `redact`. Used to strip secret
    /// values before the error is recorded or displayed.
    pub fn redacted(self, redact: impl Fn(&str) -> String) -> Self {
        match self {
            AdapterError::Fetch { detail, exit_code } => AdapterError::Fetch {
                detail: redact(&detail),
                exit_code,
            },
            AdapterError::Install { detail, exit_code } => AdapterError::Install {
                detail: redact(&detail),
                exit_code,
            },
            AdapterError::Materialize { detail } => AdapterError::Materialize {
                detail: redact(&detail),
            },
            AdapterError::Build { detail, exit_code } => AdapterError::Build {
                detail: redact(&detail),
                exit_code,
            },
            AdapterError::Transfer { detail, exit_code } => AdapterError::Transfer {
                detail: redact(&detail),
                exit_code,
            },
            AdapterError::Registration { detail, status } => AdapterError::Registration {
                detail: redact(&detail),
                status,
            },
            AdapterError::Command { detail, exit_code } => AdapterError::Command {
                detail: redact(&detail),
                exit_code,
            },
            AdapterError::InvalidParameter { name, reason } => AdapterError::InvalidParameter {
                name: redact(&name),
                reason: redact(&reason),
            },
            AdapterError::Spawn { program, detail } => AdapterError::Spawn {
                program: redact(&program),
                detail: redact(&detail),
            },
        }
    }

    /// Process exit status carried by the error, when one was observed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            AdapterError::Fetch { exit_code, .. }
            | AdapterError::Install { exit_code, .. }
            | AdapterError::Build { exit_code, .. }
            | AdapterError::Transfer { exit_code, .. }
            | AdapterError::Command { exit_code, .. } => *exit_code,
            AdapterError::Materialize { .. }
            | AdapterError::Registration { .. }
            | AdapterError::InvalidParameter { .. }
            | AdapterError::Spawn { .. } => None,
        }
    }
}

/// Why a step ended in failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    /// The adapter reported a failure.
    #[error("step '{step_name}' failed: {cause}")]
    Execution {
        step_name: String,
        cause: AdapterError,
    },

    /// The attempt did not finish within its timeout.
    #[error("step '{step_name}' timed out after {timeout_secs}s")]
    Timeout { step_name: String, timeout_secs: u64 },
}

impl StepError {
    pub fn step_name(&self) -> &str {
        match self {
            StepError::Execution { step_name, .. } | StepError::Timeout { step_name, .. } => {
                step_name
            }
        }
    }

    /// See [`AdapterError::redacted`].
    pub fn redacted(self, redact: impl Fn(&str) -> String) -> Self {
        match self {
            StepError::Execution { step_name, cause } => StepError::Execution {
                step_name,
                cause: cause.redacted(redact),
            },
            timeout @ StepError::Timeout { .. } => timeout,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepError::Execution { cause, .. } => cause.exit_code(),
            StepError::Timeout { .. } => None,
        }
    }
}

/// Errors from secret providers.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found")]
    NotFound,

    #[error("secret provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider is read-only")]
    ReadOnly,

    #[error("storage error: {0}")]
    StorageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::Transfer {
            detail: "connection refused".to_string(),
            exit_code: Some(255),
        };
        assert_eq!(err.to_string(), "transfer failed: connection refused");
        assert_eq!(err.exit_code(), Some(255));
    }

    #[test]
    fn test_step_error_wraps_cause() {
        let err = StepError::Execution {
            step_name: "build".to_string(),
            cause: AdapterError::Build {
                detail: "tsc exited with 2".to_string(),
                exit_code: Some(2),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("build"));
        assert!(msg.contains("tsc exited with 2"));
        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(err.step_name(), "build");
    }

    #[test]
    fn test_step_error_serializes_with_kind_tag() {
        let err = StepError::Timeout {
            step_name: "deploy".to_string(),
            timeout_secs: 30,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["timeout_secs"], 30);
    }

    #[test]
    fn test_redacted_rewrites_detail_only() {
        let err = StepError::Execution {
            step_name: "publish".to_string(),
            cause: AdapterError::InvalidParameter {
                name: "port".to_string(),
                reason: "'s3cr3t' is not a number".to_string(),
            },
        };
        let redacted = err.redacted(|text| text.replace("s3cr3t", "***"));
        assert_eq!(redacted.step_name(), "publish");
        assert_eq!(
            redacted.to_string(),
            "step 'publish' failed: invalid parameter 'port': '***' is not a number"
        );
    }

    #[test]
    fn test_missing_parameter_display() {
        let err = AdapterError::missing_parameter("host");
        assert_eq!(
            err.to_string(),
            "invalid parameter 'host': required parameter is missing"
        );
    }
}
