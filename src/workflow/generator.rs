//! Stage task generation.

use crate::core::{indent_width, Document, Line};

use super::context::WorkflowContext;
use super::definition::{WorkflowStage, WorkflowSubStage};
use super::markers::stage_marker;

/// How many lines below a task are checked for nested children.
pub const CHILD_LOOKAHEAD: usize = 20;

/// Build the task line(s) for a stage.
///
/// A sub-stage task reads `- [ ] Stage (Sub) [stage::stage.sub]`. A plain
/// task for a cycle stage gets an indented child task for its first
/// sub-stage when `add_subtasks` is set.
pub fn generate_workflow_task_text(
    stage: &WorkflowStage,
    indentation: &str,
    ctx: &WorkflowContext<'_>,
    add_subtasks: bool,
    sub_stage: Option<&WorkflowSubStage>,
) -> String {
    let timestamp = ctx.start_timestamp().map(|t| format!(" {t}")).unwrap_or_default();

    if let Some(sub_stage) = sub_stage {
        return sub_stage_task(indentation, stage, sub_stage, ctx, &timestamp);
    }

    let mut text = format!(
        "{indentation}- [{}] {} {}{timestamp}",
        ctx.statuses.pending_marker(),
        stage.name,
        stage_marker(&stage.id, None)
    );

    if let (true, true, Some(first)) = (add_subtasks, stage.is_cycle(), stage.sub_stages.first()) {
        let child_indentation = format!("{indentation}{}", ctx.indent_unit);
        text.push('\n');
        text.push_str(&sub_stage_task(&child_indentation, stage, first, ctx, &timestamp));
    }

    text
}

fn sub_stage_task(
    indentation: &str,
    stage: &WorkflowStage,
    sub_stage: &WorkflowSubStage,
    ctx: &WorkflowContext<'_>,
    timestamp: &str,
) -> String {
    format!(
        "{indentation}- [{}] {} ({}) {}{timestamp}",
        ctx.statuses.pending_marker(),
        stage.name,
        sub_stage.name,
        stage_marker(&stage.id, Some(&sub_stage.id))
    )
}

/// Find where a new sibling task should be inserted after `line`.
///
/// Lines directly below that are indented deeper than `indentation` are
/// children; the new task goes after the last of them (looking at most
/// [`CHILD_LOOKAHEAD`] lines ahead), or right after the line itself.
pub fn determine_task_insertion_point(line: &Line<'_>, doc: &Document, indentation: &str) -> usize {
    let indent = indentation.chars().count();
    let last = (line.number + CHILD_LOOKAHEAD).min(doc.lines());

    (line.number + 1..=last)
        .map(|n| doc.line(n))
        .take_while(|child| indent_width(child.text) > indent)
        .last()
        .map_or(line.to, |child| child.to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, TaskStatusConfig, WorkflowSettings};
    use crate::workflow::definition::{StageType, WorkflowDefinition};
    use crate::workflow::markers::extract_workflow_info;
    use crate::workflow::registry::WorkflowRegistry;
    use chrono::NaiveDate;

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 20).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    fn cycle_stage() -> WorkflowStage {
        WorkflowStage::new("dev", "Development", StageType::Cycle)
            .with_sub_stage("coding", "Coding", Some("testing"))
            .with_sub_stage("testing", "Testing", None)
    }

    #[test]
    fn test_generate_plain_task() {
        let settings = WorkflowSettings::default();
        let registry = WorkflowRegistry::new(Vec::new());
        let statuses = Config::default().task_statuses;
        let ctx = WorkflowContext::new(&settings, &registry, &statuses, "\t", now());

        let stage = WorkflowStage::new("review", "Review", StageType::Linear);
        insta::assert_snapshot!(
            generate_workflow_task_text(&stage, "", &ctx, true, None),
            @"- [ ] Review [stage::review]"
        );
    }

    #[test]
    fn test_generate_cycle_with_first_sub_stage() {
        let settings = WorkflowSettings::default();
        let registry = WorkflowRegistry::new(Vec::new());
        let statuses = Config::default().task_statuses;
        let ctx = WorkflowContext::new(&settings, &registry, &statuses, "  ", now());

        let text = generate_workflow_task_text(&cycle_stage(), "", &ctx, true, None);
        assert_eq!(
            text,
            "- [ ] Development [stage::dev]\n  - [ ] Development (Coding) [stage::dev.coding]"
        );

        let text = generate_workflow_task_text(&cycle_stage(), "", &ctx, false, None);
        assert_eq!(text, "- [ ] Development [stage::dev]");
    }

    #[test]
    fn test_generate_sub_stage_with_timestamp() {
        let settings = WorkflowSettings { auto_add_timestamp: true, ..WorkflowSettings::default() };
        let registry = WorkflowRegistry::new(Vec::new());
        let statuses = Config::default().task_statuses;
        let ctx = WorkflowContext::new(&settings, &registry, &statuses, "\t", now());

        let stage = cycle_stage();
        let text = generate_workflow_task_text(&stage, "", &ctx, true, stage.sub_stage("testing"));

        insta::assert_snapshot!(text, @"- [ ] Development (Testing) [stage::dev.testing] 🛫 2024-03-20 09:30:00");
    }

    #[test]
    fn test_generate_uses_configured_pending_status() {
        let settings = WorkflowSettings::default();
        let registry = WorkflowRegistry::new(Vec::new());
        let statuses = TaskStatusConfig { not_started: "?".to_string(), ..Default::default() };
        let ctx = WorkflowContext::new(&settings, &registry, &statuses, "\t", now());

        let text = generate_workflow_task_text(&cycle_stage(), "", &ctx, true, None);
        assert_eq!(
            text,
            "- [?] Development [stage::dev]\n\t- [?] Development (Coding) [stage::dev.coding]"
        );
    }

    #[test]
    fn test_generated_marker_round_trips() {
        let settings = WorkflowSettings::default();
        let registry = WorkflowRegistry::new(Vec::new());
        let statuses = Config::default().task_statuses;
        let ctx = WorkflowContext::new(&settings, &registry, &statuses, "\t", now());

        for stage in WorkflowDefinition::project_workflow().stages {
            let text = generate_workflow_task_text(&stage, "", &ctx, false, None);
            let info = extract_workflow_info(&text).unwrap();
            assert_eq!(info.current_stage(), stage.id);

            for sub_stage in &stage.sub_stages {
                let text = generate_workflow_task_text(&stage, "", &ctx, false, Some(sub_stage));
                let info = extract_workflow_info(&text).unwrap();
                assert_eq!(info.current_stage(), stage.id);
                assert_eq!(info.sub_stage(), Some(sub_stage.id.as_str()));
            }
        }
    }

    #[test]
    fn test_insertion_point_after_children() {
        let doc = Document::new("- [x] parent\n\t- [ ] child\n\t\t- [ ] grandchild\n- [ ] sibling");
        let line = doc.line(1);

        assert_eq!(determine_task_insertion_point(&line, &doc, ""), doc.line(3).to);
    }

    #[test]
    fn test_insertion_point_without_children() {
        let doc = Document::new("- [x] a\n- [ ] b\n\t- [ ] not a child of a");
        let line = doc.line(1);

        assert_eq!(determine_task_insertion_point(&line, &doc, ""), line.to);

        let last = doc.line(3);
        assert_eq!(determine_task_insertion_point(&last, &doc, "\t"), last.to);
    }

    #[test]
    fn test_insertion_point_lookahead_is_bounded() {
        let mut text = String::from("- [x] parent");
        for i in 0..30 {
            text.push_str(&format!("\n\t- [ ] child {i}"));
        }
        let doc = Document::new(text);

        let point = determine_task_insertion_point(&doc.line(1), &doc, "");
        assert_eq!(point, doc.line(1 + CHILD_LOOKAHEAD).to);
    }
}
