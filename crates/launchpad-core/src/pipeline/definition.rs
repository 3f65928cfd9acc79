//! Workflow definition parsing, validation, and filesystem operations.
//!
//! Converts between YAML files and `WorkflowDefinition`, validates structural
//! constraints (name format, unique step names, secret names, working
//! directories), and discovers workflow files on disk.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use launchpad_types::secret::is_valid_secret_name;
use launchpad_types::workflow::{ParamValue, WorkflowDefinition};
use thiserror::Error;
use tracing::warn;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("malformed workflow YAML: {0}")]
    Parse(String),

    #[error("failed to encode workflow: {0}")]
    Serialize(String),

    #[error("invalid workflow: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn invalid(msg: impl Into<String>) -> DefinitionError {
    DefinitionError::Invalid(msg.into())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Deserialize and validate. A definition that comes back from here is
/// ready to hand to the runner.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, DefinitionError> {
    serde_yaml_ng::from_str::<WorkflowDefinition>(yaml)
        .map_err(|e| DefinitionError::Parse(e.to_string()))
        .and_then(|def| validate_definition(&def).map(|()| def))
}

pub fn serialize_workflow_yaml(def: &WorkflowDefinition) -> Result<String, DefinitionError> {
    serde_yaml_ng::to_string(def).map_err(|e| DefinitionError::Serialize(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - Name is non-empty and contains only alphanumerics, `-` and `_`
/// - At least one trigger kind and at least one step
/// - Step names are non-empty and unique
/// - Every step names an action (`uses`)
/// - Timeouts are > 0
/// - Secret references use valid names
/// - Working directories are relative and stay inside the run root
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), DefinitionError> {
    if def.name.is_empty() {
        return Err(invalid("workflow name must not be empty"));
    }
    if !def
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(format!(
            "workflow name '{}' contains invalid characters (only alphanumerics, '-' and '_' allowed)",
            def.name
        )));
    }

    if def.triggers.is_empty() {
        return Err(invalid("workflow must declare at least one trigger in 'on'"));
    }

    if def.steps.is_empty() {
        return Err(invalid("workflow must have at least one step"));
    }

    if def.timeout_secs == Some(0) {
        return Err(invalid("workflow timeout_secs must be > 0"));
    }

    validate_env(&def.env, "workflow")?;

    let mut seen = HashSet::new();
    for step in &def.steps {
        if step.name.trim().is_empty() {
            return Err(invalid("step name must not be empty"));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(invalid(format!("duplicate step name: '{}'", step.name)));
        }
        if step.uses.trim().is_empty() {
            return Err(invalid(format!(
                "step '{}' must name an action in 'uses'",
                step.name
            )));
        }
        if step.timeout_secs == Some(0) {
            return Err(invalid(format!(
                "step '{}' timeout_secs must be > 0",
                step.name
            )));
        }
        if let Some(kinds) = &step.if_trigger {
            if kinds.is_empty() {
                return Err(invalid(format!(
                    "step '{}' has an empty if_trigger list",
                    step.name
                )));
            }
        }
        if let Some(dir) = &step.working_dir {
            validate_working_dir(&step.name, dir)?;
        }
        for value in step.params.values() {
            validate_value(&step.name, value)?;
        }
        validate_env(&step.env, &step.name)?;
    }

    Ok(())
}

fn validate_env(
    env: &std::collections::BTreeMap<String, ParamValue>,
    owner: &str,
) -> Result<(), DefinitionError> {
    for (key, value) in env {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(invalid(format!(
                "{owner}: invalid environment variable name '{key}'"
            )));
        }
        validate_value(owner, value)?;
    }
    Ok(())
}

fn validate_value(owner: &str, value: &ParamValue) -> Result<(), DefinitionError> {
    if let Some(name) = value.secret_name() {
        if !is_valid_secret_name(name) {
            return Err(invalid(format!(
                "{owner}: invalid secret reference name '{name}'"
            )));
        }
    }
    Ok(())
}

fn validate_working_dir(step: &str, dir: &Path) -> Result<(), DefinitionError> {
    for component in dir.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(invalid(format!(
                    "step '{step}': working_dir '{}' must not contain '..'",
                    dir.display()
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(format!(
                    "step '{step}': working_dir '{}' must be relative",
                    dir.display()
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, DefinitionError> {
    parse_workflow_yaml(&std::fs::read_to_string(path)?)
}

/// Validate, then write `def` as YAML, creating missing parent directories.
pub fn save_workflow_file(path: &Path, def: &WorkflowDefinition) -> Result<(), DefinitionError> {
    validate_definition(def)?;
    let yaml = serialize_workflow_yaml(def)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, yaml)?;
    Ok(())
}

fn is_workflow_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

/// Every loadable workflow below `base_dir`, sorted by path.
///
/// Hidden directories are not entered. Files that fail to load are logged
/// and left out; a missing `base_dir` yields an empty list.
pub fn discover_workflows(
    base_dir: &Path,
) -> Result<Vec<(PathBuf, WorkflowDefinition)>, DefinitionError> {
    let mut found = Vec::new();
    if !base_dir.is_dir() {
        return Ok(found);
    }

    let mut pending = vec![base_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if path.is_dir() {
                if !hidden {
                    pending.push(path);
                }
                continue;
            }
            if !is_workflow_file(&path) {
                continue;
            }
            match load_workflow_file(&path) {
                Ok(def) => found.push((path, def)),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping workflow file"),
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_types::workflow::{StepSpec, TriggerKind};

    const DEPLOY_YAML: &str = r#"
name: deploy-ui
on: [release-published, manual-dispatch]
steps:
  - name: checkout
    uses: fetch
    with:
      repository: https://github.com/acme/ui
  - name: build
    uses: build
    working_dir: ui
    timeout_secs: 600
  - name: upload
    uses: transfer
    with:
      host: deploy.example.com
      key: { secret: DEPLOY_KEY }
"#;

    fn minimal() -> WorkflowDefinition {
        WorkflowDefinition::new("deploy", vec![TriggerKind::ManualDispatch])
            .step(StepSpec::new("a", "command"))
    }

    #[test]
    fn parse_valid_definition() {
        let def = parse_workflow_yaml(DEPLOY_YAML).unwrap();
        assert_eq!(def.name, "deploy-ui");
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.secret_names(), vec!["DEPLOY_KEY"]);
    }

    #[test]
    fn parse_error_is_reported() {
        let err = parse_workflow_yaml("name: [unclosed").unwrap_err();
        assert!(matches!(err, DefinitionError::Parse(_)));
    }

    #[test]
    fn rejects_duplicate_step_names() {
        let def = minimal().step(StepSpec::new("a", "build"));
        let err = validate_definition(&def).unwrap_err();
        assert!(err.to_string().contains("duplicate step name"));
    }

    #[test]
    fn rejects_missing_triggers() {
        let mut def = minimal();
        def.triggers.clear();
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn rejects_empty_steps() {
        let def = WorkflowDefinition::new("deploy", vec![TriggerKind::ManualDispatch]);
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn rejects_invalid_name() {
        let mut def = minimal();
        def.name = "deploy ui!".to_string();
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let def = minimal().step(StepSpec::new("b", "build").timeout_secs(0));
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn rejects_escaping_working_dir() {
        let def = minimal().step(StepSpec::new("b", "build").working_dir("../outside"));
        let err = validate_definition(&def).unwrap_err();
        assert!(err.to_string().contains(".."));

        let def = minimal().step(StepSpec::new("b", "build").working_dir("/abs"));
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn rejects_bad_secret_name() {
        let def = minimal().step(StepSpec::new("b", "build").secret_param("token", "has space"));
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("deploy.yaml");
        let def = parse_workflow_yaml(DEPLOY_YAML).unwrap();

        save_workflow_file(&path, &def).unwrap();
        let loaded = load_workflow_file(&path).unwrap();
        assert_eq!(loaded.name, def.name);
        assert_eq!(loaded.steps[2].params, def.steps[2].params);
    }

    #[test]
    fn discover_skips_invalid_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("deploy.yml"), DEPLOY_YAML).unwrap();
        std::fs::write(tmp.path().join("broken.yaml"), "not: [valid").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub").join("other.yaml"), DEPLOY_YAML).unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        std::fs::write(tmp.path().join(".git").join("hidden.yaml"), DEPLOY_YAML).unwrap();

        let found = discover_workflows(tmp.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|(_, def)| def.name == "deploy-ui"));
    }

    #[test]
    fn discover_missing_dir_is_empty() {
        let found = discover_workflows(Path::new("/nonexistent/launchpad/workflows")).unwrap();
        assert!(found.is_empty());
    }
}
