//! Concrete step adapters and the default action registry.
//!
//! | action | adapter |
//! |---|---|
//! | `fetch` | [`fetch::FetchAdapter`] (git clone) |
//! | `install` | [`install::InstallAdapter`] (npm) |
//! | `materialize-secret` | [`materialize::MaterializeSecretAdapter`] |
//! | `build` | [`build::BuildAdapter`] (npm run) |
//! | `transfer` | [`transfer::TransferAdapter`] (ssh/scp) |
//! | `register-release` | [`register::RegisterReleaseAdapter`] (HTTP) |
//! | `command` | [`command::CommandAdapter`] (sh -c) |

pub mod build;
pub mod command;
pub mod fetch;
pub mod install;
pub mod materialize;
pub mod process;
pub mod register;
pub mod transfer;

use std::path::{Component, Path, PathBuf};

use launchpad_core::pipeline::adapter::AdapterRegistry;
use launchpad_types::error::AdapterError;

/// Registry with every built-in adapter.
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry
        .register(fetch::FetchAdapter)
        .register(install::InstallAdapter)
        .register(materialize::MaterializeSecretAdapter)
        .register(build::BuildAdapter)
        .register(transfer::TransferAdapter)
        .register(register::RegisterReleaseAdapter::new())
        .register(command::CommandAdapter);
    registry
}

/// Join a relative parameter path onto `base`, rejecting absolute paths and
/// `..` so adapters cannot write outside the step directory.
pub(crate) fn contained_path(base: &Path, param: &str, value: &str) -> Result<PathBuf, AdapterError> {
    let relative = Path::new(value);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(AdapterError::invalid_parameter(
                    param,
                    "must be a relative path inside the working directory",
                ));
            }
        }
    }
    Ok(base.join(relative))
}

/// Parse an optional numeric parameter.
pub(crate) fn parse_number<T: std::str::FromStr>(
    param: &str,
    value: Option<&str>,
) -> Result<Option<T>, AdapterError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| AdapterError::invalid_parameter(param, format!("'{raw}' is not a number")))
        })
        .transpose()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Builds real invocations for adapter tests.

    use std::path::{Path, PathBuf};

    use launchpad_core::pipeline::adapter::StepInvocation;
    use launchpad_core::pipeline::context::{ResolvedParams, RunContext};
    use launchpad_core::repository::secret::MemorySecretProvider;
    use launchpad_core::service::secret::SecretStore;
    use launchpad_types::workflow::{StepSpec, TriggerEvent, TriggerKind, WorkflowDefinition};
    use uuid::Uuid;

    pub struct Harness {
        ctx: RunContext,
        step: StepSpec,
        params: ResolvedParams,
        env: ResolvedParams,
        dir: PathBuf,
    }

    impl Harness {
        pub async fn new(step: StepSpec, secrets: &[(&str, &str)], root: &Path) -> Self {
            let definition = WorkflowDefinition::new("test-workflow", vec![TriggerKind::ReleasePublished])
                .step(step.clone());
            let store = SecretStore::single(MemorySecretProvider::with_secrets(
                secrets.iter().copied(),
            ));
            let ctx = RunContext::prepare(
                Uuid::now_v7(),
                &definition,
                TriggerEvent::ReleasePublished {
                    release_id: "v1.2.3".to_string(),
                },
                root.to_path_buf(),
                &store,
            )
            .await
            .unwrap();
            let env = ctx.resolve_env(&step);
            let params = ctx.resolve_params(&step, &env);
            let dir = ctx.working_dir(&step);
            Self {
                ctx,
                step,
                params,
                env,
                dir,
            }
        }

        pub fn invocation(&self) -> StepInvocation<'_> {
            StepInvocation::new(&self.ctx, &self.step, 1, &self.params, &self.env, &self.dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_action() {
        let registry = default_registry();
        assert_eq!(
            registry.actions(),
            vec![
                "build",
                "command",
                "fetch",
                "install",
                "materialize-secret",
                "register-release",
                "transfer",
            ]
        );
    }

    #[test]
    fn contained_path_rejects_escapes() {
        let base = Path::new("/work");
        assert_eq!(
            contained_path(base, "path", "config/.env").unwrap(),
            PathBuf::from("/work/config/.env")
        );
        assert!(contained_path(base, "path", "../etc/passwd").is_err());
        assert!(contained_path(base, "path", "/etc/passwd").is_err());
    }

    #[test]
    fn parse_number_reports_parameter() {
        assert_eq!(parse_number::<u32>("depth", Some("3")).unwrap(), Some(3));
        assert_eq!(parse_number::<u32>("depth", None).unwrap(), None);
        let err = parse_number::<u32>("depth", Some("deep")).unwrap_err();
        assert!(err.to_string().contains("depth"));
    }
}
