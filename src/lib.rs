//! # Taskstage
//!
//! Multi-stage workflows encoded as plain-text task markers in markdown outlines.
//!
//! A task tagged `#workflow/<id>` starts a workflow. Checking it off creates a
//! task for the first stage; checking that off creates the next one, and so on
//! through linear stages, cyclic sub-stage loops and jump edges until a
//! terminal stage completes the root task.
//!
//! ## Features
//!
//! - **Text as state**: the current stage is re-read from `[stage::id.sub]` markers on every edit
//! - **Declarative definitions**: workflows in TOML config or YAML files
//! - **Transaction filter**: completion edits are augmented in one atomic step
//! - **Time bookkeeping**: start timestamps, spent time and workflow totals
//!
//! ## Quick Start
//!
//! ```bash
//! # Complete the task on line 2 and let the workflow advance
//! taskstage complete notes.md --line 2
//!
//! # Show where a task sits in its workflow
//! taskstage info notes.md --line 2
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_map_or)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::use_self)]

pub mod core;
pub mod workflow;

// Re-export commonly used types
pub use core::{Annotation, Change, Config, Document, Transaction};
pub use workflow::{WorkflowDefinition, WorkflowEngine, WorkflowRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "taskstage";
