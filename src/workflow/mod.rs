//! Workflow stage engine.
//!
//! Multi-stage workflows live directly in a markdown outline:
//!
//! ```text
//! - [ ] Ship search #workflow/project_workflow
//!     - [x] Planning
//!     - [ ] In Progress [stage::in_progress]
//!         - [ ] In Progress (Development) [stage::in_progress.development] 🛫 2024-03-20 09:00:00
//! ```
//!
//! Nothing is stored outside the text. Every pass re-reads the markers
//! around the edited line, decides the next stage from the registered
//! [`WorkflowDefinition`]s, and returns the edits that move the task along.
//!
//! ## Pipeline
//!
//! - `markers` - marker syntax (`#workflow/id`, `[stage::id.sub]`)
//! - `locator` / `resolver` - find the workflow and stage of a line
//! - `transition` - next-stage decision, finality, menu options
//! - `timing` - start timestamps and spent time
//! - `generator` - new stage task text and placement
//! - `interceptor` - the transaction filter tying it together

mod context;
mod definition;
mod generator;
mod interceptor;
mod locator;
mod markers;
mod registry;
mod resolver;
mod timing;
mod transition;

pub use context::WorkflowContext;
pub use definition::{
    StageNext, StageType, WorkflowDefinition, WorkflowMetadata, WorkflowStage, WorkflowSubStage,
    ROOT_STAGE_ID,
};
pub use generator::{determine_task_insertion_point, generate_workflow_task_text, CHILD_LOOKAHEAD};
pub use interceptor::{
    create_stage_transition, handle_workflow_transaction, is_completion_change, WorkflowEngine,
};
pub use locator::find_parent_workflow;
pub use markers::{
    extract_workflow_info, find_stage_marker, find_time_spent, find_workflow_tag,
    has_workflow_tag, parse_task_line, stage_marker, TaskLine,
    WorkflowInfo, ROOT_MARKER, STAGE_SEPARATOR,
};
pub use registry::{
    discover_definitions, parse_definitions, parse_definitions_str, DefinitionError,
    DefinitionResult, WorkflowRegistry,
};
pub use resolver::{resolve_workflow_info, ResolvedSummary, ResolvedWorkflowInfo, StagePosition};
pub use timing::{
    format_duration, format_timestamp, moment_to_strftime, parse_spent_time, parse_timestamp,
    process_timestamp_and_calculate_time, timestamp_token, TimeFormatError, START_GLYPH,
};
pub use transition::{
    determine_next_stage, is_final_position, is_last_workflow_stage_or_not_workflow,
    transition_options, NextStage, TransitionOption,
};
