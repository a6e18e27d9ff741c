//! Workflow definition registry.
//!
//! The registry is the read-only catalog the engine resolves `#workflow/<id>`
//! tags against. Definitions come from the config file and from YAML files
//! discovered next to the document tree.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use super::definition::{StageType, WorkflowDefinition};

/// Result type for definition validation.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Problems found in workflow definitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// A workflow without an id.
    #[error("Workflow '{0}' has an empty id")]
    EmptyWorkflowId(String),

    /// Two workflows share an id.
    #[error("Duplicate workflow id '{0}'")]
    DuplicateWorkflow(String),

    /// A workflow without stages.
    #[error("Workflow '{0}' has no stages")]
    NoStages(String),

    /// Two stages of one workflow share an id.
    #[error("Workflow '{workflow}' has duplicate stage id '{stage}'")]
    DuplicateStage { workflow: String, stage: String },

    /// Two sub-stages of one stage share an id.
    #[error("Stage '{stage}' in workflow '{workflow}' has duplicate sub-stage id '{sub_stage}'")]
    DuplicateSubStage { workflow: String, stage: String, sub_stage: String },

    /// Sub-stages declared on a stage that is not a cycle.
    #[error("Stage '{stage}' in workflow '{workflow}' declares sub-stages but is not a cycle stage")]
    SubStagesOnNonCycle { workflow: String, stage: String },

    /// `next` or `canProceedTo` points at a stage that does not exist.
    #[error("Stage '{stage}' in workflow '{workflow}' references unknown stage '{target}'")]
    UnknownStage { workflow: String, stage: String, target: String },

    /// A sub-stage `next` points at a sub-stage that does not exist.
    #[error("Sub-stage '{sub_stage}' of stage '{stage}' in workflow '{workflow}' references unknown sub-stage '{target}'")]
    UnknownSubStage { workflow: String, stage: String, sub_stage: String, target: String },
}

/// Read-only catalog of workflow definitions.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    definitions: Vec<WorkflowDefinition>,
}

impl WorkflowRegistry {
    /// Create a registry from definitions, keeping their order.
    pub fn new(definitions: Vec<WorkflowDefinition>) -> Self {
        Self { definitions }
    }

    /// Look up a workflow by id.
    pub fn get(&self, id: &str) -> Option<&WorkflowDefinition> {
        self.definitions.iter().find(|wf| wf.id == id)
    }

    /// Iterate over all definitions.
    pub fn iter(&self) -> impl Iterator<Item = &WorkflowDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Add definitions; a definition with an existing id replaces the old one.
    pub fn merge(&mut self, definitions: impl IntoIterator<Item = WorkflowDefinition>) {
        for definition in definitions {
            if let Some(existing) = self.definitions.iter_mut().find(|wf| wf.id == definition.id) {
                tracing::debug!(workflow = %definition.id, "Replacing workflow definition");
                *existing = definition;
            } else {
                self.definitions.push(definition);
            }
        }
    }

    /// Validate all definitions, returning the first problem.
    pub fn validate(&self) -> DefinitionResult<()> {
        match self.problems().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }

    /// Collect every problem in the registered definitions.
    pub fn problems(&self) -> Vec<DefinitionError> {
        let mut problems = Vec::new();
        let mut workflow_ids = HashSet::new();

        for workflow in &self.definitions {
            if workflow.id.trim().is_empty() {
                problems.push(DefinitionError::EmptyWorkflowId(workflow.name.clone()));
            } else if !workflow_ids.insert(workflow.id.as_str()) {
                problems.push(DefinitionError::DuplicateWorkflow(workflow.id.clone()));
            }

            problems.extend(check_stages(workflow));
        }

        problems
    }
}

fn check_stages(workflow: &WorkflowDefinition) -> Vec<DefinitionError> {
    let mut problems = Vec::new();

    if workflow.stages.is_empty() {
        problems.push(DefinitionError::NoStages(workflow.id.clone()));
        return problems;
    }

    let mut stage_ids = HashSet::new();
    for stage in &workflow.stages {
        if !stage_ids.insert(stage.id.as_str()) {
            problems.push(DefinitionError::DuplicateStage {
                workflow: workflow.id.clone(),
                stage: stage.id.clone(),
            });
        }
    }

    for stage in &workflow.stages {
        let targets = stage
            .next
            .iter()
            .flat_map(|next| next.ids())
            .chain(stage.can_proceed_to.iter().map(String::as_str));
        for target in targets {
            if !stage_ids.contains(target) {
                problems.push(DefinitionError::UnknownStage {
                    workflow: workflow.id.clone(),
                    stage: stage.id.clone(),
                    target: target.to_string(),
                });
            }
        }

        if stage.sub_stages.is_empty() {
            continue;
        }

        if stage.stage_type != StageType::Cycle {
            problems.push(DefinitionError::SubStagesOnNonCycle {
                workflow: workflow.id.clone(),
                stage: stage.id.clone(),
            });
        }

        let mut sub_ids = HashSet::new();
        for sub_stage in &stage.sub_stages {
            if !sub_ids.insert(sub_stage.id.as_str()) {
                problems.push(DefinitionError::DuplicateSubStage {
                    workflow: workflow.id.clone(),
                    stage: stage.id.clone(),
                    sub_stage: sub_stage.id.clone(),
                });
            }
        }

        for sub_stage in &stage.sub_stages {
            if let Some(target) = sub_stage.next.as_deref() {
                if !sub_ids.contains(target) {
                    problems.push(DefinitionError::UnknownSubStage {
                        workflow: workflow.id.clone(),
                        stage: stage.id.clone(),
                        sub_stage: sub_stage.id.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    problems
}

/// A definition file holds either one workflow or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Many(Vec<WorkflowDefinition>),
    One(WorkflowDefinition),
}

/// Parse workflow definitions from YAML text.
pub fn parse_definitions_str(content: &str) -> anyhow::Result<Vec<WorkflowDefinition>> {
    let definitions = match serde_yaml::from_str(content)? {
        DefinitionFile::Many(definitions) => definitions,
        DefinitionFile::One(definition) => vec![definition],
    };

    for definition in &definitions {
        if definition.id.trim().is_empty() {
            anyhow::bail!("Workflow '{}' has an empty id", definition.name);
        }
    }

    Ok(definitions)
}

/// Parse workflow definitions from a YAML file.
pub fn parse_definitions(path: &Path) -> anyhow::Result<Vec<WorkflowDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;
    parse_definitions_str(&content)
}

/// Discover workflow definition files in a directory.
///
/// Looks in `.taskstage/workflows/` and `workflows/`.
pub fn discover_definitions(dir: &Path) -> anyhow::Result<Vec<WorkflowDefinition>> {
    let mut definitions = Vec::new();

    let workflows_dir = dir.join(".taskstage").join("workflows");
    if workflows_dir.exists() {
        definitions.extend(scan_definition_dir(&workflows_dir)?);
    }

    let alt_workflows_dir = dir.join("workflows");
    if alt_workflows_dir.exists() {
        definitions.extend(scan_definition_dir(&alt_workflows_dir)?);
    }

    Ok(definitions)
}

fn scan_definition_dir(dir: &Path) -> anyhow::Result<Vec<WorkflowDefinition>> {
    let mut definitions = Vec::new();

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read workflow directory: {}", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == "yaml" || e == "yml"))
        .collect();
    paths.sort();

    for path in paths {
        match parse_definitions(&path) {
            Ok(parsed) => definitions.extend(parsed),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to parse workflow definitions");
            }
        }
    }

    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::WorkflowStage;

    fn linear(id: &str) -> WorkflowStage {
        WorkflowStage::new(id, id.to_uppercase(), StageType::Linear)
    }

    #[test]
    fn test_default_workflow_is_valid() {
        let registry = WorkflowRegistry::new(vec![WorkflowDefinition::project_workflow()]);
        assert!(registry.validate().is_ok());
        assert!(registry.get("project_workflow").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_ids_reported() {
        let registry = WorkflowRegistry::new(vec![
            WorkflowDefinition::new("a", "A", vec![linear("s"), linear("s")]),
            WorkflowDefinition::new("a", "A again", vec![linear("s")]),
        ]);

        let problems = registry.problems();
        assert!(problems.contains(&DefinitionError::DuplicateWorkflow("a".to_string())));
        assert!(problems.contains(&DefinitionError::DuplicateStage {
            workflow: "a".to_string(),
            stage: "s".to_string(),
        }));
    }

    #[test]
    fn test_dangling_references_reported() {
        let stages = vec![
            linear("plan").with_next("nowhere"),
            WorkflowStage::new("loop", "Loop", StageType::Cycle)
                .with_sub_stage("one", "One", Some("two"))
                .with_can_proceed_to(["plan"]),
        ];
        let registry = WorkflowRegistry::new(vec![WorkflowDefinition::new("wf", "WF", stages)]);

        let problems = registry.problems();
        assert_eq!(problems.len(), 2);
        assert!(matches!(&problems[0], DefinitionError::UnknownStage { target, .. } if target == "nowhere"));
        assert!(matches!(&problems[1], DefinitionError::UnknownSubStage { target, .. } if target == "two"));
    }

    #[test]
    fn test_sub_stages_on_linear_stage_reported() {
        let stages = vec![linear("plan").with_sub_stage("x", "X", None)];
        let registry = WorkflowRegistry::new(vec![WorkflowDefinition::new("wf", "WF", stages)]);

        assert_eq!(
            registry.validate(),
            Err(DefinitionError::SubStagesOnNonCycle {
                workflow: "wf".to_string(),
                stage: "plan".to_string(),
            })
        );
    }

    #[test]
    fn test_merge_replaces_by_id() {
        let mut registry = WorkflowRegistry::new(vec![WorkflowDefinition::project_workflow()]);
        registry.merge(vec![
            WorkflowDefinition::new("project_workflow", "Replaced", vec![linear("only")]),
            WorkflowDefinition::new("extra", "Extra", vec![linear("s")]),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("project_workflow").unwrap().name, "Replaced");
    }

    #[test]
    fn test_parse_single_and_list() {
        let single = "id: one\nname: One\nstages:\n  - id: s\n    name: S\n";
        let list = "- id: a\n  name: A\n- id: b\n  name: B\n";

        assert_eq!(parse_definitions_str(single).unwrap().len(), 1);
        let parsed = parse_definitions_str(list).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].id, "b");
    }

    #[test]
    fn test_parse_empty_id_fails() {
        assert!(parse_definitions_str("id: \"\"\nname: Nameless\n").is_err());
    }

    #[test]
    fn test_discover_definitions() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let workflows_dir = temp_dir.path().join(".taskstage").join("workflows");
        std::fs::create_dir_all(&workflows_dir).unwrap();

        std::fs::write(
            workflows_dir.join("release.yaml"),
            "id: release\nname: Release\nstages:\n  - id: cut\n    name: Cut\n",
        )
        .unwrap();
        std::fs::write(workflows_dir.join("broken.yml"), "id: [unclosed").unwrap();
        std::fs::write(workflows_dir.join("notes.txt"), "ignored").unwrap();

        let definitions = discover_definitions(temp_dir.path()).unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].id, "release");
    }
}
