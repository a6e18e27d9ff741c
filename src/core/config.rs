//! Configuration management for taskstage.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowDefinition;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workflow engine settings
    pub workflow: WorkflowSettings,

    /// Task status characters
    pub task_statuses: TaskStatusConfig,

    /// Editor settings (indentation)
    pub editor: EditorConfig,
}

/// Workflow engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Whether automatic stage transitions are enabled
    pub enabled: bool,

    /// Strip the `[stage::...]` marker from a task when it completes
    pub auto_remove_last_stage_marker: bool,

    /// Append a start timestamp to newly created stage tasks
    pub auto_add_timestamp: bool,

    /// Start timestamp format (moment-style tokens, e.g. `YYYY-MM-DD HH:mm:ss`)
    pub timestamp_format: String,

    /// Remove the start timestamp when a task transitions
    pub remove_timestamp_on_transition: bool,

    /// Annotate completed tasks with the time spent on them
    pub calculate_spent_time: bool,

    /// Spent time format (`HH:mm:ss` or `mm:ss`)
    pub spent_time_format: String,

    /// Annotate the final task of a workflow with the workflow's total time
    pub calculate_full_spent_time: bool,

    /// Workflow definitions
    pub definitions: Vec<WorkflowDefinition>,
}

/// Task status characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStatusConfig {
    /// Status characters meaning "completed", separated by `|`
    pub completed: String,

    /// Status character of a fresh task
    pub not_started: String,
}

/// Editor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Indent with tabs instead of spaces
    pub use_tabs: bool,

    /// Number of spaces per indent level when not using tabs
    pub tab_size: usize,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.taskstage.toml` in current directory
    /// 2. `~/.config/taskstage/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".taskstage.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir =
            Self::config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("taskstage"))
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_remove_last_stage_marker: false,
            auto_add_timestamp: false,
            timestamp_format: "YYYY-MM-DD HH:mm:ss".to_string(),
            remove_timestamp_on_transition: false,
            calculate_spent_time: false,
            spent_time_format: "HH:mm:ss".to_string(),
            calculate_full_spent_time: false,
            definitions: vec![WorkflowDefinition::project_workflow()],
        }
    }
}

impl WorkflowSettings {
    /// The start timestamp format, falling back to the default when blank.
    pub fn timestamp_format(&self) -> &str {
        if self.timestamp_format.trim().is_empty() {
            "YYYY-MM-DD HH:mm:ss"
        } else {
            &self.timestamp_format
        }
    }
}

impl Default for TaskStatusConfig {
    fn default() -> Self {
        Self { completed: "x|X".to_string(), not_started: " ".to_string() }
    }
}

impl TaskStatusConfig {
    /// The individual completed status markers.
    pub fn completed_statuses(&self) -> impl Iterator<Item = &str> + '_ {
        self.completed.split('|').filter(|s| !s.is_empty())
    }

    /// Whether a status marker means "completed".
    pub fn is_completed(&self, status: &str) -> bool {
        self.completed_statuses().any(|s| s == status)
    }

    /// The marker written when the engine completes a task itself.
    pub fn completion_marker(&self) -> &str {
        self.completed_statuses().next().unwrap_or("x")
    }

    /// The marker of a freshly generated task.
    pub fn pending_marker(&self) -> &str {
        let mut chars = self.not_started.chars();
        match (chars.next(), chars.next()) {
            (Some(_), None) => &self.not_started,
            _ => " ",
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { use_tabs: true, tab_size: 4 }
    }
}

impl EditorConfig {
    /// One level of indentation.
    pub fn indent_unit(&self) -> String {
        if self.use_tabs {
            "\t".to_string()
        } else {
            " ".repeat(self.tab_size.max(1))
        }
    }
}
