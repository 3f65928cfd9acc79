//! `launchpad validate` and `launchpad list`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::json;

use launchpad_core::pipeline::adapter::AdapterRegistry;
use launchpad_core::pipeline::definition::{discover_workflows, load_workflow_file};
use launchpad_infra::adapter::default_registry;
use launchpad_types::workflow::WorkflowDefinition;

use crate::state::AppState;

/// Steps whose `uses` names no registered adapter, as `(step, action)`.
pub fn unknown_actions<'a>(
    def: &'a WorkflowDefinition,
    registry: &AdapterRegistry,
) -> Vec<(&'a str, &'a str)> {
    def.steps
        .iter()
        .filter(|step| !registry.contains(&step.uses))
        .map(|step| (step.name.as_str(), step.uses.as_str()))
        .collect()
}

fn trigger_list(def: &WorkflowDefinition) -> String {
    def.triggers
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn handle_validate(file: &Path, json: bool) -> Result<()> {
    let def = load_workflow_file(file)
        .with_context(|| format!("Invalid workflow {}", file.display()))?;
    let registry = default_registry();
    let unknown = unknown_actions(&def, &registry);
    let secrets = def.secret_names();

    if json {
        let body = json!({
            "file": file.display().to_string(),
            "name": def.name,
            "valid": unknown.is_empty(),
            "triggers": def.triggers,
            "steps": def.steps.iter().map(|s| json!({ "name": s.name, "uses": s.uses })).collect::<Vec<_>>(),
            "secrets": secrets,
            "unknown_actions": unknown.iter().map(|(step, action)| json!({ "step": step, "uses": action })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!();
        println!(
            "  {} ({} steps, triggers: {})",
            style(&def.name).cyan().bold(),
            def.steps.len(),
            trigger_list(&def)
        );
        for (index, step) in def.steps.iter().enumerate() {
            let known = registry.contains(&step.uses);
            let uses = if known {
                style(step.uses.as_str()).dim()
            } else {
                style(step.uses.as_str()).red()
            };
            println!("    {:>2}. {} {}", index + 1, step.name, uses);
        }
        if !secrets.is_empty() {
            println!("  Secrets: {}", secrets.join(", "));
        }
        println!();
    }

    if !unknown.is_empty() {
        let names = unknown
            .iter()
            .map(|(step, action)| format!("{step} ({action})"))
            .collect::<Vec<_>>()
            .join(", ");
        bail!(
            "Unknown step action in {names}. Available: {}",
            registry.actions().join(", ")
        );
    }

    if !json {
        println!("  {} Workflow is valid.", style("✓").green().bold());
        println!();
    }
    Ok(())
}

pub fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let dir = state.workflows_dir();
    let workflows = discover_workflows(&dir)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    if json {
        let body: Vec<_> = workflows
            .iter()
            .map(|(path, def)| {
                json!({
                    "name": def.name,
                    "description": def.description,
                    "triggers": def.triggers,
                    "steps": def.steps.len(),
                    "file": path.display().to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows found in {}", style(dir.display()).dim());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Triggers"),
            Cell::new("Steps"),
            Cell::new("File"),
        ]);
    for (path, def) in &workflows {
        let file = path.strip_prefix(&dir).unwrap_or(path);
        table.add_row(vec![
            Cell::new(&def.name),
            Cell::new(trigger_list(def)),
            Cell::new(def.steps.len()),
            Cell::new(file.display()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_types::workflow::{StepSpec, TriggerKind};

    #[test]
    fn reports_steps_with_unregistered_actions() {
        let def = WorkflowDefinition::new("deploy", vec![TriggerKind::ManualDispatch])
            .step(StepSpec::new("checkout", "fetch"))
            .step(StepSpec::new("ship", "teleport"));
        let unknown = unknown_actions(&def, &default_registry());
        assert_eq!(unknown, vec![("ship", "teleport")]);
    }

    #[test]
    fn validate_rejects_unknown_action_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.yaml");
        std::fs::write(
            &path,
            "name: deploy\non: [manual-dispatch]\nsteps:\n  - name: ship\n    uses: teleport\n",
        )
        .unwrap();
        let err = handle_validate(&path, true).unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn trigger_list_joins_kinds() {
        let def = WorkflowDefinition::new(
            "deploy",
            vec![TriggerKind::ReleasePublished, TriggerKind::ManualDispatch],
        );
        assert_eq!(trigger_list(&def), "release-published, manual-dispatch");
    }
}
