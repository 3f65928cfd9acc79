//! Workflow domain types for Launchpad.
//!
//! `WorkflowDefinition` is the canonical in-memory representation of a
//! release pipeline. YAML files and programmatic builders both produce this
//! struct; it is validated once at load time and never mutated afterwards.
//! Trigger kinds and trigger events live here as well.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::secret::SecretRef;

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// A declared release pipeline.
///
/// ```yaml
/// name: deploy-ui
/// on: [release-published, manual-dispatch]
/// steps:
///   - name: checkout
///     uses: fetch
///     with:
///       repository: https://github.com/acme/ui
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name (alphanumerics, `-` and `_`).
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Trigger kinds this workflow accepts.
    #[serde(rename = "on")]
    pub triggers: Vec<TriggerKind>,
    /// Environment bindings shared by every step.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, ParamValue>,
    /// Default per-step timeout in seconds (steps may override).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Steps in execution order.
    pub steps: Vec<StepSpec>,
}

impl WorkflowDefinition {
    /// Create an empty definition accepting the given triggers.
    pub fn new(name: impl Into<String>, triggers: Vec<TriggerKind>) -> Self {
        Self {
            name: name.into(),
            description: None,
            triggers,
            env: BTreeMap::new(),
            timeout_secs: None,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Whether a trigger of this kind may start the workflow.
    pub fn accepts(&self, kind: TriggerKind) -> bool {
        self.triggers.contains(&kind)
    }

    /// Every secret name referenced anywhere in the definition, in
    /// declaration order, duplicates removed.
    pub fn secret_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let workflow_refs = self.env.values().filter_map(ParamValue::secret_name);
        let step_refs = self.steps.iter().flat_map(StepSpec::secret_names);
        for name in workflow_refs.chain(step_refs) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

// ---------------------------------------------------------------------------
// Step Specification
// ---------------------------------------------------------------------------

/// A single named step delegated to an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name. Unique within a workflow.
    pub name: String,
    /// Action reference: the registered adapter that performs this step.
    pub uses: String,
    /// Adapter parameters.
    #[serde(default, rename = "with", skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,
    /// Working directory relative to the run root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Step-level environment bindings (override workflow bindings).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, ParamValue>,
    /// Extra attempts after the first failure.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry: u32,
    /// Per-attempt timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Run even after an earlier step failed or the run was cancelled.
    #[serde(default, skip_serializing_if = "is_false")]
    pub always_run: bool,
    /// Restrict the step to these trigger kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_trigger: Option<Vec<TriggerKind>>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl StepSpec {
    pub fn new(name: impl Into<String>, uses: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uses: uses.into(),
            params: BTreeMap::new(),
            working_dir: None,
            env: BTreeMap::new(),
            retry: 0,
            timeout_secs: None,
            always_run: false,
            if_trigger: None,
        }
    }

    /// Add a literal parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .insert(name.into(), ParamValue::Literal(value.into()));
        self
    }

    /// Add a parameter resolved from the secret store.
    pub fn secret_param(mut self, name: impl Into<String>, secret: impl Into<String>) -> Self {
        self.params
            .insert(name.into(), ParamValue::Secret(SecretRef::new(secret)));
        self
    }

    pub fn env_var(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.env.insert(name.into(), value);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn retry(mut self, count: u32) -> Self {
        self.retry = count;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn always_run(mut self) -> Self {
        self.always_run = true;
        self
    }

    pub fn only_on(mut self, kinds: Vec<TriggerKind>) -> Self {
        self.if_trigger = Some(kinds);
        self
    }

    /// Whether this step applies to the given trigger kind.
    pub fn runs_for(&self, kind: TriggerKind) -> bool {
        self.if_trigger
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&kind))
    }

    /// Secret names referenced by this step's parameters and env bindings.
    pub fn secret_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .values()
            .chain(self.env.values())
            .filter_map(ParamValue::secret_name)
    }
}

// ---------------------------------------------------------------------------
// Parameter values
// ---------------------------------------------------------------------------

/// A parameter or env value: either literal text or a secret reference.
///
/// YAML scalars (strings, numbers, booleans) become literals; a mapping of
/// the form `{ secret: NAME }` becomes a secret reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawParamValue")]
pub enum ParamValue {
    Secret(SecretRef),
    Literal(String),
}

impl Serialize for ParamValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Secret(r) => r.serialize(serializer),
            ParamValue::Literal(s) => serializer.serialize_str(s),
        }
    }
}

impl ParamValue {
    pub fn literal(value: impl Into<String>) -> Self {
        ParamValue::Literal(value.into())
    }

    pub fn secret(name: impl Into<String>) -> Self {
        ParamValue::Secret(SecretRef::new(name))
    }

    /// The referenced secret name, if this value is a secret reference.
    pub fn secret_name(&self) -> Option<&str> {
        match self {
            ParamValue::Secret(r) => Some(r.secret.as_str()),
            ParamValue::Literal(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawParamValue {
    Secret(SecretRef),
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<RawParamValue> for ParamValue {
    fn from(raw: RawParamValue) -> Self {
        match raw {
            RawParamValue::Secret(r) => ParamValue::Secret(r),
            RawParamValue::Text(s) => ParamValue::Literal(s),
            RawParamValue::Integer(n) => ParamValue::Literal(n.to_string()),
            RawParamValue::Float(f) => ParamValue::Literal(f.to_string()),
            RawParamValue::Bool(b) => ParamValue::Literal(b.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// The kinds of event that can start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    ReleasePublished,
    ManualDispatch,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::ReleasePublished => "release-published",
            TriggerKind::ManualDispatch => "manual-dispatch",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release-published" | "release" => Ok(TriggerKind::ReleasePublished),
            "manual-dispatch" | "manual" => Ok(TriggerKind::ManualDispatch),
            other => Err(format!(
                "unknown trigger kind '{other}' (expected 'release-published' or 'manual-dispatch')"
            )),
        }
    }
}

/// The event that started a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TriggerEvent {
    /// A release was published; carries its identifier (usually the tag).
    ReleasePublished { release_id: String },
    /// Started by hand; no payload.
    ManualDispatch,
}

impl TriggerEvent {
    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerEvent::ReleasePublished { .. } => TriggerKind::ReleasePublished,
            TriggerEvent::ManualDispatch => TriggerKind::ManualDispatch,
        }
    }

    pub fn release_id(&self) -> Option<&str> {
        match self {
            TriggerEvent::ReleasePublished { release_id } => Some(release_id),
            TriggerEvent::ManualDispatch => None,
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::ReleasePublished { release_id } => {
                write!(f, "release-published ({release_id})")
            }
            TriggerEvent::ManualDispatch => f.write_str("manual-dispatch"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
