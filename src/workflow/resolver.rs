//! Workflow info resolution.
//!
//! Combines the marker extractor, the parent locator and the registry into
//! a fully resolved position inside a workflow definition. Nothing is
//! cached: a line is resolved from scratch against each document snapshot.

use std::borrow::Cow;

use serde::Serialize;

use crate::core::Document;

use super::definition::{WorkflowDefinition, WorkflowStage, WorkflowSubStage, ROOT_STAGE_ID};
use super::locator::find_parent_workflow;
use super::markers::{extract_workflow_info, WorkflowInfo};
use super::registry::WorkflowRegistry;

/// A task's position in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePosition<'a> {
    /// The root task, before the first stage.
    Root,
    /// A stage, without a (known) sub-stage.
    Stage(&'a WorkflowStage),
    /// A sub-stage of a stage.
    SubStage { stage: &'a WorkflowStage, sub_stage: &'a WorkflowSubStage },
}

impl<'a> StagePosition<'a> {
    /// The stage id; [`ROOT_STAGE_ID`] for the root.
    pub fn stage_id(&self) -> &'a str {
        match self {
            Self::Root => ROOT_STAGE_ID,
            Self::Stage(stage) | Self::SubStage { stage, .. } => &stage.id,
        }
    }

    /// The stage, unless this is the root.
    pub fn stage(&self) -> Option<&'a WorkflowStage> {
        match self {
            Self::Root => None,
            Self::Stage(stage) | Self::SubStage { stage, .. } => Some(stage),
        }
    }

    pub fn sub_stage(&self) -> Option<&'a WorkflowSubStage> {
        match self {
            Self::SubStage { sub_stage, .. } => Some(sub_stage),
            _ => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

/// Fully resolved workflow information for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkflowInfo<'a> {
    /// Id of the workflow the line belongs to
    pub workflow_type: String,
    /// Position within the workflow
    pub position: StagePosition<'a>,
    /// The workflow definition
    pub workflow: &'a WorkflowDefinition,
    /// Whether the line is the workflow's root task
    pub is_root_task: bool,
}

impl<'a> ResolvedWorkflowInfo<'a> {
    /// The current stage, fabricating the synthetic root stage when needed.
    pub fn current_stage(&self) -> Cow<'a, WorkflowStage> {
        match self.position.stage() {
            Some(stage) => Cow::Borrowed(stage),
            None => Cow::Owned(WorkflowStage::synthetic_root(self.workflow)),
        }
    }

    pub fn current_sub_stage(&self) -> Option<&'a WorkflowSubStage> {
        self.position.sub_stage()
    }

    /// A serializable summary for presentation layers.
    pub fn summary(&self) -> ResolvedSummary {
        let stage = self.current_stage();
        ResolvedSummary {
            workflow: self.workflow.id.clone(),
            workflow_name: self.workflow.name.clone(),
            stage: stage.id.clone(),
            stage_name: stage.name.clone(),
            stage_type: format!("{:?}", stage.stage_type).to_lowercase(),
            sub_stage: self.current_sub_stage().map(|s| s.id.clone()),
            sub_stage_name: self.current_sub_stage().map(|s| s.name.clone()),
            is_root_task: self.is_root_task,
        }
    }
}

/// Owned view of a [`ResolvedWorkflowInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSummary {
    pub workflow: String,
    pub workflow_name: String,
    pub stage: String,
    pub stage_name: String,
    pub stage_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage_name: Option<String>,
    pub is_root_task: bool,
}

/// Resolve the workflow position of a line.
///
/// Returns `None` when the line has no marker, when a stage marker has no
/// locatable parent workflow, or when the workflow or stage id is unknown.
/// An unknown sub-stage id is not a failure; the sub-stage is left out.
pub fn resolve_workflow_info<'r>(
    line_text: &str,
    doc: &Document,
    line_number: usize,
    registry: &'r WorkflowRegistry,
) -> Option<ResolvedWorkflowInfo<'r>> {
    let info = extract_workflow_info(line_text)?;

    let workflow_type = match &info {
        WorkflowInfo::Root { workflow } => workflow.clone(),
        WorkflowInfo::FromParent { .. } => find_parent_workflow(doc, line_number)?.to_string(),
    };

    let Some(workflow) = registry.get(&workflow_type) else {
        tracing::debug!(workflow = %workflow_type, line = line_number, "Unknown workflow");
        return None;
    };

    if info.is_root() {
        return Some(ResolvedWorkflowInfo {
            workflow_type,
            position: StagePosition::Root,
            workflow,
            is_root_task: true,
        });
    }

    let Some(stage) = workflow.stage(info.current_stage()) else {
        tracing::debug!(
            workflow = %workflow_type,
            stage = info.current_stage(),
            line = line_number,
            "Unknown stage"
        );
        return None;
    };

    let position = match info.sub_stage().and_then(|id| stage.sub_stage(id)) {
        Some(sub_stage) => StagePosition::SubStage { stage, sub_stage },
        None => StagePosition::Stage(stage),
    };

    Some(ResolvedWorkflowInfo { workflow_type, position, workflow, is_root_task: false })
}
