//! Workflow definition schema.
//!
//! Definitions are read-only at runtime. They are deserialized from the
//! `[[workflow.definitions]]` config tables or from YAML definition files.

use serde::{Deserialize, Serialize};

/// Sentinel id of the synthetic root stage.
pub const ROOT_STAGE_ID: &str = "_root_task_";

/// Kind of a workflow stage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    /// Single successor
    #[default]
    Linear,
    /// Internal sub-stage loop
    Cycle,
    /// No successor
    Terminal,
}

/// The `next` field of a stage: one id or a list of ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StageNext {
    One(String),
    Many(Vec<String>),
}

impl StageNext {
    /// The successor used by automatic transitions.
    pub fn first(&self) -> Option<&str> {
        let first = match self {
            Self::One(id) => Some(id.as_str()),
            Self::Many(ids) => ids.first().map(String::as_str),
        };
        first.filter(|id| !id.is_empty())
    }

    /// All listed ids.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::One(id) => vec![id.as_str()],
            Self::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

/// A node inside a cycle stage's internal loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowSubStage {
    /// Identifier, unique within the owning stage
    pub id: String,

    /// Display name
    pub name: String,

    /// Next sub-stage in the loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// A stage of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowStage {
    /// Identifier, unique within the workflow
    pub id: String,

    /// Display name
    pub name: String,

    /// Stage kind
    #[serde(rename = "type", default)]
    pub stage_type: StageType,

    /// Explicit successor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<StageNext>,

    /// Jump edges available regardless of the normal successor
    #[serde(default, alias = "canProceedTo", skip_serializing_if = "Vec::is_empty")]
    pub can_proceed_to: Vec<String>,

    /// Sub-stages (cycle stages only)
    #[serde(default, alias = "subStages", skip_serializing_if = "Vec::is_empty")]
    pub sub_stages: Vec<WorkflowSubStage>,
}

impl WorkflowStage {
    /// Create a stage with no edges.
    pub fn new(id: impl Into<String>, name: impl Into<String>, stage_type: StageType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stage_type,
            next: None,
            can_proceed_to: Vec::new(),
            sub_stages: Vec::new(),
        }
    }

    /// Set the explicit successor.
    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(StageNext::One(next.into()));
        self
    }

    /// Set the jump edges.
    pub fn with_can_proceed_to<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.can_proceed_to = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Append a sub-stage.
    pub fn with_sub_stage(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        next: Option<&str>,
    ) -> Self {
        self.sub_stages.push(WorkflowSubStage {
            id: id.into(),
            name: name.into(),
            next: next.map(str::to_string),
        });
        self
    }

    /// The synthetic root stage of a workflow: linear, leading to the first stage.
    pub fn synthetic_root(workflow: &WorkflowDefinition) -> Self {
        Self {
            id: ROOT_STAGE_ID.to_string(),
            name: "Root Task".to_string(),
            stage_type: StageType::Linear,
            next: workflow.stages.first().map(|s| StageNext::One(s.id.clone())),
            can_proceed_to: Vec::new(),
            sub_stages: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage_type == StageType::Terminal
    }

    pub fn is_cycle(&self) -> bool {
        self.stage_type == StageType::Cycle
    }

    /// The explicit successor, if any.
    pub fn explicit_next(&self) -> Option<&str> {
        self.next.as_ref().and_then(StageNext::first)
    }

    /// The first jump edge, if any.
    pub fn first_jump(&self) -> Option<&str> {
        self.can_proceed_to.first().map(String::as_str)
    }

    /// Look up a sub-stage by id.
    pub fn sub_stage(&self, id: &str) -> Option<&WorkflowSubStage> {
        self.sub_stages.iter().find(|s| s.id == id)
    }
}

/// Bookkeeping metadata of a definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(alias = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// A named, ordered state machine over task stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowDefinition {
    /// Identifier referenced by `#workflow/<id>` tags
    pub id: String,

    /// Display name
    pub name: String,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered stages
    #[serde(default)]
    pub stages: Vec<WorkflowStage>,

    /// Metadata
    #[serde(default)]
    pub metadata: WorkflowMetadata,
}

impl WorkflowDefinition {
    /// Create a definition.
    pub fn new(id: impl Into<String>, name: impl Into<String>, stages: Vec<WorkflowStage>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            stages,
            metadata: WorkflowMetadata::default(),
        }
    }

    /// Look up a stage by id.
    pub fn stage(&self, id: &str) -> Option<&WorkflowStage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Position of a stage in the stage list.
    pub fn stage_index(&self, id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == id)
    }

    pub fn first_stage(&self) -> Option<&WorkflowStage> {
        self.stages.first()
    }

    /// Whether the stage is the last one in the stage list.
    pub fn is_last_stage(&self, id: &str) -> bool {
        self.stage_index(id).is_some_and(|i| i + 1 == self.stages.len())
    }

    /// The stage following `id` in the stage list.
    pub fn next_positional(&self, id: &str) -> Option<&WorkflowStage> {
        self.stage_index(id).and_then(|i| self.stages.get(i + 1))
    }

    /// The standard project workflow shipped as the default definition.
    pub fn project_workflow() -> Self {
        let mut workflow = Self::new(
            "project_workflow",
            "Project Workflow",
            vec![
                WorkflowStage::new("planning", "Planning", StageType::Linear)
                    .with_next("in_progress"),
                WorkflowStage::new("in_progress", "In Progress", StageType::Cycle)
                    .with_sub_stage("development", "Development", Some("testing"))
                    .with_sub_stage("testing", "Testing", Some("development"))
                    .with_can_proceed_to(["review", "cancelled"]),
                WorkflowStage::new("review", "Review", StageType::Cycle)
                    .with_can_proceed_to(["in_progress", "completed"]),
                WorkflowStage::new("completed", "Completed", StageType::Terminal),
                WorkflowStage::new("cancelled", "Cancelled", StageType::Terminal),
            ],
        );
        workflow.description = Some("Standard project management workflow".to_string());
        workflow.metadata = WorkflowMetadata {
            version: Some("1.0".to_string()),
            created: Some("2024-03-20".to_string()),
            last_modified: Some("2024-03-20".to_string()),
        };
        workflow
    }
}
