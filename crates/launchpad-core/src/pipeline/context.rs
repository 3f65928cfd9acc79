//! Per-run execution context: resolved secrets, parameter rendering, masking.
//!
//! A `RunContext` is built once per run after every referenced secret has
//! been resolved. Steps then read their parameters and environment through
//! it; secret-backed values are flagged so they are never logged in clear.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use launchpad_types::error::AdapterError;
use launchpad_types::secret::REDACTED;
use launchpad_types::workflow::{ParamValue, StepSpec, TriggerEvent, WorkflowDefinition};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use super::runner::RunError;
use crate::service::secret::{Resolution, SecretMap, SecretStore};

// ---------------------------------------------------------------------------
// Resolved values
// ---------------------------------------------------------------------------

/// A parameter or env value after secret substitution and template rendering.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    /// Derived from a secret; must not appear in logs.
    pub sensitive: bool,
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            f.write_str(REDACTED)
        } else {
            write!(f, "{:?}", self.value)
        }
    }
}

/// Named values handed to an adapter (its parameters or its environment).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedParams(BTreeMap<String, ResolvedValue>);

impl ResolvedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ResolvedValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.value.as_str())
    }

    /// Fetch a required, non-empty value.
    pub fn require(&self, name: &str) -> Result<&str, AdapterError> {
        match self.get(name) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(AdapterError::missing_parameter(name)),
        }
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| v.sensitive)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ResolvedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// SecretMasker
// ---------------------------------------------------------------------------

/// Replaces resolved secret values in free text with `***`.
pub struct SecretMasker {
    // Longest first so a secret containing another is masked whole.
    values: Vec<SecretString>,
}

impl SecretMasker {
    pub fn new(secrets: &SecretMap) -> Self {
        let mut values: Vec<SecretString> = secrets
            .values()
            .filter(|v| !v.expose_secret().is_empty())
            .map(|v| SecretString::from(v.expose_secret().to_string()))
            .collect();
        values.sort_by_key(|v| std::cmp::Reverse(v.expose_secret().len()));
        Self { values }
    }

    /// A masker that masks nothing.
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for value in &self.values {
            let value = value.expose_secret();
            if masked.contains(value) {
                masked = masked.replace(value, REDACTED);
            }
        }
        masked
    }
}

impl fmt::Debug for SecretMasker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretMasker")
            .field("values", &self.values.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// Immutable state shared by every step of one run.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    pub workflow: String,
    pub trigger: TriggerEvent,
    /// Workspace root; step working directories are relative to it.
    pub root: PathBuf,
    workflow_env: BTreeMap<String, ParamValue>,
    secrets: SecretMap,
    masker: SecretMasker,
}

impl RunContext {
    /// Resolve every secret the definition references, all or nothing.
    ///
    /// Fails with `RunError::SecretResolution` listing every missing name
    /// when any reference cannot be resolved.
    pub async fn prepare(
        run_id: Uuid,
        definition: &WorkflowDefinition,
        trigger: TriggerEvent,
        root: PathBuf,
        store: &SecretStore,
    ) -> Result<Self, RunError> {
        let names = definition.secret_names();
        let secrets = match store.resolve_all(names.iter().copied()).await {
            Ok(Resolution::Resolved(secrets)) => secrets,
            Ok(Resolution::Missing(missing)) => {
                return Err(RunError::SecretResolution { missing });
            }
            Err(source) => return Err(RunError::SecretStore { source }),
        };
        tracing::debug!(%run_id, count = secrets.len(), "secrets resolved");

        let masker = SecretMasker::new(&secrets);
        Ok(Self {
            run_id,
            workflow: definition.name.clone(),
            trigger,
            root,
            workflow_env: definition.env.clone(),
            secrets,
            masker,
        })
    }

    pub fn secret(&self, name: &str) -> Option<&SecretString> {
        self.secrets.get(name)
    }

    pub fn masker(&self) -> &SecretMasker {
        &self.masker
    }

    /// Absolute working directory for a step.
    pub fn working_dir(&self, step: &StepSpec) -> PathBuf {
        match &step.working_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }

    /// Environment for a step: workflow bindings overlaid by step bindings.
    pub fn resolve_env(&self, step: &StepSpec) -> ResolvedParams {
        let mut env = ResolvedParams::new();
        for (key, value) in self.workflow_env.iter().chain(step.env.iter()) {
            env.insert(key.clone(), self.resolve_value(value, None));
        }
        env
    }

    /// Adapter parameters for a step. `{{ env.NAME }}` placeholders read the
    /// step's resolved environment.
    pub fn resolve_params(&self, step: &StepSpec, env: &ResolvedParams) -> ResolvedParams {
        let mut params = ResolvedParams::new();
        for (key, value) in &step.params {
            params.insert(key.clone(), self.resolve_value(value, Some(env)));
        }
        params
    }

    fn resolve_value(&self, value: &ParamValue, env: Option<&ResolvedParams>) -> ResolvedValue {
        match value {
            ParamValue::Secret(reference) => ResolvedValue {
                // prepare() guarantees every referenced name is present
                value: self
                    .secrets
                    .get(reference.name())
                    .map(|s| s.expose_secret().to_string())
                    .unwrap_or_default(),
                sensitive: true,
            },
            ParamValue::Literal(text) => self.render(text, env),
        }
    }

    /// Expand `{{ ... }}` placeholders. Unknown placeholders are kept as-is.
    ///
    /// Supported: `run.id`, `workflow.name`, `trigger.kind`,
    /// `trigger.release_id` (empty for manual dispatch), `env.<NAME>`
    /// (literal env values only).
    pub fn render(&self, template: &str, env: Option<&ResolvedParams>) -> ResolvedValue {
        let mut out = String::with_capacity(template.len());
        let mut sensitive = false;
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start..].find("}}") else {
                break;
            };
            let end = start + len + 2;
            out.push_str(&rest[..start]);
            let expr = rest[start + 2..end - 2].trim();
            match self.lookup(expr, env) {
                Some(value) => {
                    sensitive |= value.sensitive;
                    out.push_str(&value.value);
                }
                None => out.push_str(&rest[start..end]),
            }
            rest = &rest[end..];
        }
        out.push_str(rest);

        ResolvedValue {
            value: out,
            sensitive,
        }
    }

    fn lookup(&self, expr: &str, env: Option<&ResolvedParams>) -> Option<ResolvedValue> {
        let plain = |value: String| {
            Some(ResolvedValue {
                value,
                sensitive: false,
            })
        };
        match expr {
            "run.id" => plain(self.run_id.to_string()),
            "workflow.name" => plain(self.workflow.clone()),
            "trigger.kind" => plain(self.trigger.kind().to_string()),
            "trigger.release_id" => plain(self.trigger.release_id().unwrap_or_default().to_string()),
            _ => {
                // secret-backed env values are not substituted
                let name = expr.strip_prefix("env.")?;
                env?.0.get(name).filter(|v| !v.sensitive).cloned()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
