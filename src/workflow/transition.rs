//! Stage graph transitions.
//!
//! Pure decision functions over a resolved position: which stage follows,
//! whether a completion ends the workflow, and which moves a menu may offer.

use serde::Serialize;

use crate::core::Document;

use super::definition::{StageType, WorkflowDefinition};
use super::registry::WorkflowRegistry;
use super::resolver::{resolve_workflow_info, ResolvedWorkflowInfo, StagePosition};

/// The target of an automatic transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextStage<'a> {
    pub stage_id: &'a str,
    pub sub_stage_id: Option<&'a str>,
}

impl<'a> NextStage<'a> {
    fn stage(stage_id: &'a str) -> Self {
        Self { stage_id, sub_stage_id: None }
    }

    fn sub_stage(stage_id: &'a str, sub_stage_id: &'a str) -> Self {
        Self { stage_id, sub_stage_id: Some(sub_stage_id) }
    }
}

/// Decide where a task goes when its current position completes.
///
/// Sub-stage `next` outranks stage-level jump edges, which outrank the
/// positional fallback. Terminal stages stay where they are; callers must
/// check [`is_last_workflow_stage_or_not_workflow`] before creating a
/// follow-on task.
pub fn determine_next_stage<'a>(
    position: &StagePosition<'a>,
    workflow: &'a WorkflowDefinition,
) -> NextStage<'a> {
    let stage = match position {
        StagePosition::Root => {
            return NextStage::stage(
                workflow.first_stage().map_or(position.stage_id(), |s| s.id.as_str()),
            );
        }
        StagePosition::Stage(stage) | StagePosition::SubStage { stage, .. } => *stage,
    };

    match (stage.stage_type, position.sub_stage()) {
        (StageType::Terminal, _) => NextStage::stage(&stage.id),

        (StageType::Cycle, Some(sub_stage)) => {
            if let Some(next) = sub_stage.next.as_deref().filter(|n| !n.is_empty()) {
                return NextStage::sub_stage(&stage.id, next);
            }
            if let Some(jump) = stage.first_jump() {
                return NextStage::stage(jump);
            }
            match stage.sub_stages.as_slice() {
                [] => NextStage::stage(&stage.id),
                [only] => NextStage::sub_stage(&stage.id, &only.id),
                // Multiple sub-stages restart the loop at the first one.
                [first, ..] => NextStage::sub_stage(&stage.id, &first.id),
            }
        }

        (StageType::Cycle, None) => NextStage::stage(stage.first_jump().unwrap_or(&stage.id)),

        (StageType::Linear, _) => {
            let next = stage
                .explicit_next()
                .or_else(|| stage.first_jump())
                .or_else(|| workflow.next_positional(&stage.id).map(|s| s.id.as_str()))
                .unwrap_or(&stage.id);
            NextStage::stage(next)
        }
    }
}

/// Whether completing this line ends its workflow, or the line is not a
/// workflow task at all. `true` means no follow-on task should be created.
pub fn is_last_workflow_stage_or_not_workflow(
    line_text: &str,
    line_number: usize,
    doc: &Document,
    registry: &WorkflowRegistry,
) -> bool {
    resolve_workflow_info(line_text, doc, line_number, registry)
        .map_or(true, |resolved| is_final_position(&resolved))
}

/// Finality of an already resolved position.
pub fn is_final_position(resolved: &ResolvedWorkflowInfo<'_>) -> bool {
    let workflow = resolved.workflow;

    let stage = match resolved.position {
        StagePosition::Root => return false,
        StagePosition::Stage(stage) | StagePosition::SubStage { stage, .. } => stage,
    };

    if stage.is_terminal() {
        return true;
    }

    if let StagePosition::SubStage { sub_stage, .. } = resolved.position {
        if stage.is_cycle() {
            let last_sub_stage = sub_stage.next.as_deref().map_or(true, str::is_empty);
            return last_sub_stage
                && stage.can_proceed_to.is_empty()
                && stage.explicit_next().is_none()
                && workflow.is_last_stage(&stage.id);
        }
    }

    stage.explicit_next().is_none()
        && stage.can_proceed_to.is_empty()
        && workflow.is_last_stage(&stage.id)
}

/// An action a menu may offer for a workflow task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransitionOption {
    /// Start the workflow at its first stage
    StartWorkflow { stage: String },
    /// Complete a workflow sitting on a terminal stage
    CompleteWorkflow,
    /// Move to the automatically chosen next stage
    MoveTo {
        stage: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sub_stage: Option<String>,
    },
    /// The automatic transition loops back onto the current position
    Continue {
        stage: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sub_stage: Option<String>,
    },
    /// Leave the sub-stage loop for another stage
    CompleteSubStageAndMoveTo { stage: String },
    /// Follow a jump edge
    JumpTo { stage: String },
    /// Add a child task at the current stage
    AddChildWithSameStage,
}

impl TransitionOption {
    /// The target stage id, if the option moves somewhere.
    pub fn target(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::StartWorkflow { stage }
            | Self::CompleteSubStageAndMoveTo { stage }
            | Self::JumpTo { stage } => Some((stage.as_str(), None)),
            Self::MoveTo { stage, sub_stage } | Self::Continue { stage, sub_stage } => {
                Some((stage.as_str(), sub_stage.as_deref()))
            }
            Self::CompleteWorkflow | Self::AddChildWithSameStage => None,
        }
    }

    /// A human readable label.
    pub fn label(&self, workflow: &WorkflowDefinition) -> String {
        let name = |id: &str| workflow.stage(id).map_or_else(|| id.to_string(), |s| s.name.clone());
        let sub_name = |id: &str, sub: Option<&str>| {
            let sub = sub.and_then(|sub| workflow.stage(id)?.sub_stage(sub));
            match sub {
                Some(sub) => format!("{} ({})", name(id), sub.name),
                None => name(id),
            }
        };

        match self {
            Self::StartWorkflow { stage } => format!("Move to stage {}", name(stage)),
            Self::CompleteWorkflow => "Complete workflow".to_string(),
            Self::MoveTo { stage, sub_stage } => {
                format!("Move to {}", sub_name(stage, sub_stage.as_deref()))
            }
            Self::Continue { stage, sub_stage } => {
                format!("Continue {}", sub_name(stage, sub_stage.as_deref()))
            }
            Self::CompleteSubStageAndMoveTo { stage } => {
                format!("Complete substage and move to {}", name(stage))
            }
            Self::JumpTo { stage } => format!("Move to stage {}", name(stage)),
            Self::AddChildWithSameStage => "Add child task with same stage".to_string(),
        }
    }
}

/// List the moves available from a resolved position.
///
/// Root tasks only offer to start the workflow and terminal stages only
/// offer to complete it. Automatic transitions always take the first jump
/// edge; the full `can_proceed_to` list is exposed here.
pub fn transition_options(resolved: &ResolvedWorkflowInfo<'_>) -> Vec<TransitionOption> {
    let workflow = resolved.workflow;
    let mut options = Vec::new();

    match resolved.position {
        StagePosition::Root => {
            if let Some(first) = workflow.first_stage() {
                options.push(TransitionOption::StartWorkflow { stage: first.id.clone() });
            }
        }
        StagePosition::Stage(stage) | StagePosition::SubStage { stage, .. } if stage.is_terminal() => {
            options.push(TransitionOption::CompleteWorkflow);
        }
        StagePosition::Stage(stage) | StagePosition::SubStage { stage, .. } => {
            let next = determine_next_stage(&resolved.position, workflow);

            if workflow.stage(next.stage_id).is_some() {
                let current_sub = resolved.position.sub_stage().map(|s| s.id.as_str());
                let stage_id = next.stage_id.to_string();
                let sub_stage = next.sub_stage_id.map(str::to_string);

                if next.stage_id == stage.id && next.sub_stage_id == current_sub {
                    options.push(TransitionOption::Continue { stage: stage_id, sub_stage });
                } else {
                    options.push(TransitionOption::MoveTo { stage: stage_id, sub_stage });
                }
            }

            let known = |id: &&str| workflow.stage(id).is_some();

            if stage.is_cycle() && resolved.position.sub_stage().is_some() {
                let exits: Vec<&str> = if !stage.can_proceed_to.is_empty() {
                    stage.can_proceed_to.iter().map(String::as_str).collect()
                } else if let Some(next) = stage.explicit_next() {
                    vec![next]
                } else {
                    workflow.next_positional(&stage.id).map(|s| s.id.as_str()).into_iter().collect()
                };

                options.extend(exits.into_iter().filter(known).map(|id| {
                    TransitionOption::CompleteSubStageAndMoveTo { stage: id.to_string() }
                }));
            } else if !stage.is_cycle() {
                options.extend(
                    stage
                        .can_proceed_to
                        .iter()
                        .map(String::as_str)
                        .filter(known)
                        .map(|id| TransitionOption::JumpTo { stage: id.to_string() }),
                );
            }

            options.push(TransitionOption::AddChildWithSameStage);
        }
    }

    options
}
