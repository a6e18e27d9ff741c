//! Engine context.
//!
//! Everything a single transaction pass needs besides the document itself,
//! passed explicitly instead of read from globals.

use chrono::NaiveDateTime;

use crate::core::{TaskStatusConfig, WorkflowSettings};

use super::registry::WorkflowRegistry;

/// Read-only inputs for one pass of the workflow engine.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowContext<'a> {
    /// Workflow settings
    pub settings: &'a WorkflowSettings,

    /// Registered workflow definitions
    pub registry: &'a WorkflowRegistry,

    /// Task status characters
    pub statuses: &'a TaskStatusConfig,

    /// One level of indentation
    pub indent_unit: &'a str,

    /// The current time, captured once per pass
    pub now: NaiveDateTime,
}

impl<'a> WorkflowContext<'a> {
    pub fn new(
        settings: &'a WorkflowSettings,
        registry: &'a WorkflowRegistry,
        statuses: &'a TaskStatusConfig,
        indent_unit: &'a str,
        now: NaiveDateTime,
    ) -> Self {
        Self { settings, registry, statuses, indent_unit, now }
    }

    /// The start timestamp to append to new tasks, if enabled.
    pub fn start_timestamp(&self) -> Option<String> {
        self.settings
            .auto_add_timestamp
            .then(|| super::timing::timestamp_token(self.now, self.settings.timestamp_format()))
    }
}
