//! Core types for taskstage.
//!
//! This module contains the host model the workflow engine runs against:
//! document snapshots, edit transactions, the clock, and configuration.

mod clock;
mod config;
mod document;
mod transaction;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, EditorConfig, TaskStatusConfig, WorkflowSettings};
pub use document::{
    ensure_within_bounds, get_indentation, indent_width, remove_trailing_indentation, Document,
    Line,
};
pub use transaction::{
    apply_changes, Annotation, CascadeKind, Change, ChangedRange, Transaction, WorkflowChangeKind,
};
