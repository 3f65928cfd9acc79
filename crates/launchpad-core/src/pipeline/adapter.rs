//! Step adapter port and the action registry.
//!
//! Each action name (`fetch`, `build`, `transfer`, ...) maps to one adapter.
//! Adapters receive a fully resolved `StepInvocation` and report an
//! `AdapterOutput` or a typed `AdapterError`; the runner owns retries,
//! timeouts and result bookkeeping.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use launchpad_types::error::AdapterError;
use launchpad_types::workflow::{StepSpec, TriggerEvent};
use secrecy::SecretString;
use uuid::Uuid;

use super::context::{ResolvedParams, RunContext, SecretMasker};

/// Everything an adapter needs to perform one attempt of one step.
#[derive(Debug)]
pub struct StepInvocation<'a> {
    pub run_id: Uuid,
    pub workflow: &'a str,
    pub step: &'a StepSpec,
    /// 1-based attempt number.
    pub attempt: u32,
    pub trigger: &'a TriggerEvent,
    pub params: &'a ResolvedParams,
    pub env: &'a ResolvedParams,
    pub working_dir: &'a Path,
    context: &'a RunContext,
}

impl<'a> StepInvocation<'a> {
    pub fn new(
        context: &'a RunContext,
        step: &'a StepSpec,
        attempt: u32,
        params: &'a ResolvedParams,
        env: &'a ResolvedParams,
        working_dir: &'a Path,
    ) -> Self {
        Self {
            run_id: context.run_id,
            workflow: &context.workflow,
            step,
            attempt,
            trigger: &context.trigger,
            params,
            env,
            working_dir,
            context,
        }
    }

    pub fn step_name(&self) -> &str {
        &self.step.name
    }

    pub fn masker(&self) -> &SecretMasker {
        self.context.masker()
    }

    /// A resolved secret by name. Only names referenced by the workflow are
    /// available.
    pub fn secret(&self, name: &str) -> Option<&SecretString> {
        self.context.secret(name)
    }
}

/// Successful adapter result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterOutput {
    pub exit_code: Option<i32>,
    /// One-line description of what was done. Must not contain secrets.
    pub summary: Option<String>,
}

impl AdapterOutput {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

// ---------------------------------------------------------------------------
// StepAdapter trait
// ---------------------------------------------------------------------------

/// Performs one kind of step.
///
/// Uses RPITIT for zero-cost static dispatch. See [`StepAdapterDyn`] for the
/// object-safe counterpart stored in the registry.
pub trait StepAdapter: Send + Sync {
    /// Action name this adapter is registered under.
    fn action(&self) -> &str;

    fn execute<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> impl Future<Output = Result<AdapterOutput, AdapterError>> + Send + 'a;
}

/// Object-safe version of [`StepAdapter`] with boxed futures.
pub trait StepAdapterDyn: Send + Sync {
    fn action(&self) -> &str;

    fn execute_boxed<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<AdapterOutput, AdapterError>> + Send + 'a>>;
}

/// Blanket implementation: any `StepAdapter` is automatically a `StepAdapterDyn`.
impl<T: StepAdapter> StepAdapterDyn for T {
    fn action(&self) -> &str {
        StepAdapter::action(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        invocation: &'a StepInvocation<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<AdapterOutput, AdapterError>> + Send + 'a>> {
        Box::pin(self.execute(invocation))
    }
}

pub type DynStepAdapter = Arc<dyn StepAdapterDyn>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps action names to adapters.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, DynStepAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own action name, replacing any previous one.
    pub fn register<A: StepAdapter + 'static>(&mut self, adapter: A) -> &mut Self {
        let action = StepAdapter::action(&adapter).to_string();
        self.adapters.insert(action, Arc::new(adapter));
        self
    }

    /// Register a shared adapter under an explicit action name.
    pub fn register_as(&mut self, action: impl Into<String>, adapter: DynStepAdapter) -> &mut Self {
        self.adapters.insert(action.into(), adapter);
        self
    }

    pub fn get(&self, action: &str) -> Option<&DynStepAdapter> {
        self.adapters.get(action)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.adapters.contains_key(action)
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}
