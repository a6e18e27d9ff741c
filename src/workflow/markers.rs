//! Textual workflow markers.
//!
//! Workflow state lives only in the document text:
//!
//! - `#workflow/<id>` tags a root task
//! - `[stage::<id>]` or `[stage::<id>.<sub>]` marks a task's current stage
//! - `- [ ]` style checkboxes carry the task status
//! - `(⏱️ HH:mm:ss)` records time spent on a completed stage
//!
//! Everything here is purely syntactic and never consults the registry.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static WORKFLOW_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#workflow/([^/\s]+)").expect("valid workflow tag pattern"));

static STAGE_MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[stage::([^\]]*)\]").expect("valid stage marker pattern"));

static STAGE_MARKER_DISPLAY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[stage::[^\]]+\]").expect("valid stage display pattern"));

static TASK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([-*+]|\d+\.)\s+\[(.)\]").expect("valid task pattern"));

static TIME_SPENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(⏱️\s+([0-9:]+)\)").expect("valid time spent pattern"));

/// Separator between stage and sub-stage ids in a marker.
pub const STAGE_SEPARATOR: char = '.';

/// Stage id that marks a task as its workflow's root.
pub const ROOT_MARKER: &str = "root";

/// Workflow information read from a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowInfo {
    /// The line carries a stage marker; its workflow comes from the
    /// enclosing root task.
    FromParent {
        /// Stage id
        stage: String,
        /// Sub-stage id, for `[stage::id.sub]` markers
        sub_stage: Option<String>,
    },

    /// The line carries only a `#workflow/<id>` tag.
    Root {
        /// Workflow id
        workflow: String,
    },
}

impl WorkflowInfo {
    /// The workflow id, or `"fromParent"` when it must be looked up.
    pub fn workflow_type(&self) -> &str {
        match self {
            Self::FromParent { .. } => "fromParent",
            Self::Root { workflow } => workflow,
        }
    }

    /// The stage id; `"root"` for root tasks.
    pub fn current_stage(&self) -> &str {
        match self {
            Self::FromParent { stage, .. } => stage,
            Self::Root { .. } => ROOT_MARKER,
        }
    }

    pub fn sub_stage(&self) -> Option<&str> {
        match self {
            Self::FromParent { sub_stage, .. } => sub_stage.as_deref(),
            Self::Root { .. } => None,
        }
    }

    /// Whether the line names the root stage, by tag or by `[stage::root]`.
    pub fn is_root(&self) -> bool {
        self.current_stage() == ROOT_MARKER
    }
}

/// Extract workflow information from a line.
///
/// A stage marker takes precedence over a root tag on the same line. An
/// empty or malformed marker makes the line a non-workflow line.
pub fn extract_workflow_info(line_text: &str) -> Option<WorkflowInfo> {
    if let Some(captures) = STAGE_MARKER_REGEX.captures(line_text) {
        let marker = captures[1].trim();
        let mut parts = marker.split(STAGE_SEPARATOR);
        let stage = parts.next().unwrap_or_default();

        if stage.is_empty() {
            return None;
        }

        let sub_stage = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        return Some(WorkflowInfo::FromParent { stage: stage.to_string(), sub_stage });
    }

    find_workflow_tag(line_text).map(|workflow| WorkflowInfo::Root { workflow: workflow.to_string() })
}

/// The workflow id of a `#workflow/<id>` tag on the line.
pub fn find_workflow_tag(line_text: &str) -> Option<&str> {
    WORKFLOW_TAG_REGEX.captures(line_text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Whether the line carries the root tag of a specific workflow.
pub fn has_workflow_tag(line_text: &str, workflow_id: &str) -> bool {
    WORKFLOW_TAG_REGEX
        .captures_iter(line_text)
        .any(|c| c.get(1).is_some_and(|m| m.as_str() == workflow_id))
}

/// Byte range of the stage marker including its leading whitespace.
pub fn find_stage_marker(line_text: &str) -> Option<Range<usize>> {
    STAGE_MARKER_DISPLAY_REGEX.find(line_text).map(|m| m.range())
}

/// Format a stage marker.
pub fn stage_marker(stage_id: &str, sub_stage_id: Option<&str>) -> String {
    match sub_stage_id {
        Some(sub) => format!("[stage::{stage_id}{STAGE_SEPARATOR}{sub}]"),
        None => format!("[stage::{stage_id}]"),
    }
}

/// A list item with a checkbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine<'a> {
    /// Leading whitespace
    pub indentation: &'a str,
    /// List marker (`-`, `*`, `+` or `1.`)
    pub bullet: &'a str,
    /// Status character inside the brackets
    pub status: &'a str,
    /// Byte range of the status character within the line
    pub status_range: Range<usize>,
}

/// Parse the checkbox prefix of a task line.
pub fn parse_task_line(line_text: &str) -> Option<TaskLine<'_>> {
    let captures = TASK_REGEX.captures(line_text)?;
    let status = captures.get(3)?;

    Some(TaskLine {
        indentation: captures.get(1).map_or("", |m| m.as_str()),
        bullet: captures.get(2).map_or("", |m| m.as_str()),
        status: status.as_str(),
        status_range: status.range(),
    })
}

/// The raw value of a `(⏱️ ...)` annotation on the line.
pub fn find_time_spent(line_text: &str) -> Option<&str> {
    TIME_SPENT_REGEX.captures(line_text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_stage_with_sub_stage() {
        assert_eq!(
            extract_workflow_info("- [ ] Dev (Coding) [stage::a.b]"),
            Some(WorkflowInfo::FromParent {
                stage: "a".to_string(),
                sub_stage: Some("b".to_string()),
            })
        );
    }

    #[test]
    fn test_extract_stage_without_sub_stage() {
        let info = extract_workflow_info("[stage::a]").unwrap();

        assert_eq!(info.workflow_type(), "fromParent");
        assert_eq!(info.current_stage(), "a");
        assert_eq!(info.sub_stage(), None);
    }

    #[test]
    fn test_extract_empty_marker_is_none() {
        assert_eq!(extract_workflow_info("[stage::]"), None);
        assert_eq!(extract_workflow_info("- [ ] task [stage::.sub] #workflow/dev"), None);
    }

    #[test]
    fn test_extract_root_tag() {
        let info = extract_workflow_info("- [ ] Ship it #workflow/dev").unwrap();

        assert_eq!(info, WorkflowInfo::Root { workflow: "dev".to_string() });
        assert_eq!(info.current_stage(), "root");
        assert!(info.is_root());
    }

    #[test]
    fn test_marker_takes_precedence_over_tag() {
        let info = extract_workflow_info("- [ ] #workflow/dev [stage::review]").unwrap();
        assert_eq!(info.current_stage(), "review");
        assert_eq!(info.workflow_type(), "fromParent");
    }

    #[test]
    fn test_plain_line_is_none() {
        assert_eq!(extract_workflow_info("- [ ] buy milk #shopping"), None);
        assert_eq!(extract_workflow_info("#workflow/"), None);
    }

    #[test]
    fn test_workflow_tag_stops_at_slash_and_space() {
        assert_eq!(find_workflow_tag("#workflow/dev/extra"), Some("dev"));
        assert_eq!(find_workflow_tag("x #workflow/dev more"), Some("dev"));
    }

    #[test]
    fn test_find_stage_marker_includes_whitespace() {
        let line = "- [x] Plan  [stage::plan] tail";
        let range = find_stage_marker(line).unwrap();

        assert_eq!(&line[range], "  [stage::plan]");
    }

    #[test]
    fn test_parse_task_line() {
        let task = parse_task_line("\t- [x] done").unwrap();
        assert_eq!(task.indentation, "\t");
        assert_eq!(task.bullet, "-");
        assert_eq!(task.status, "x");
        assert_eq!(task.status_range, 4..5);

        assert!(parse_task_line("12. [ ] numbered").is_some());
        assert!(parse_task_line("plain text").is_none());
    }

    #[test]
    fn test_find_time_spent() {
        assert_eq!(find_time_spent("- [x] Plan (⏱️ 01:02:03)"), Some("01:02:03"));
        assert_eq!(find_time_spent("- [x] Plan"), None);
    }

    #[test]
    fn test_marker_formatting() {
        assert_eq!(stage_marker("dev", None), "[stage::dev]");
        assert_eq!(stage_marker("dev", Some("coding")), "[stage::dev.coding]");
    }

    #[test]
    fn test_has_workflow_tag_matches_whole_id() {
        assert!(has_workflow_tag("- [ ] Ship #workflow/dev", "dev"));
        assert!(has_workflow_tag("#workflow/ops and #workflow/dev", "dev"));
        assert!(!has_workflow_tag("- [ ] Ship #workflow/devops", "dev"));
        assert!(!has_workflow_tag("- [ ] Ship", "dev"));
    }
}
