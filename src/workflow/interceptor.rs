//! Transaction interceptor.
//!
//! Watches edit transactions for tasks being checked off. When a workflow
//! task completes, the interceptor adds follow-up edits in the same step:
//! time bookkeeping, stage-marker cleanup, and either a task for the next
//! stage or the completion of the workflow's root task.

use std::collections::BTreeSet;

use crate::core::{
    ensure_within_bounds, get_indentation, indent_width, remove_trailing_indentation, Annotation,
    CascadeKind, Change, Clock, Config, Document, Line, SystemClock, TaskStatusConfig, Transaction,
    WorkflowChangeKind,
};

use super::context::WorkflowContext;
use super::definition::{WorkflowDefinition, WorkflowStage, WorkflowSubStage};
use super::generator::{determine_task_insertion_point, generate_workflow_task_text};
use super::locator::find_parent_workflow;
use super::markers::{
    find_stage_marker, find_workflow_tag, has_workflow_tag, parse_task_line, STAGE_SEPARATOR,
};
use super::registry::WorkflowRegistry;
use super::resolver::{resolve_workflow_info, ResolvedWorkflowInfo};
use super::timing::process_timestamp_and_calculate_time;
use super::transition::{determine_next_stage, is_final_position, is_last_workflow_stage_or_not_workflow};

/// Whether an inserted text marks a task complete: a bare completed status
/// character, or one wrapped as `[x]` or `- [x]`.
pub fn is_completion_change(inserted: &str, statuses: &TaskStatusConfig) -> bool {
    statuses.completed_statuses().any(|status| {
        inserted == status || inserted == format!("[{status}]") || inserted == format!("- [{status}]")
    })
}

/// A completed workflow task found in a transaction.
struct WorkflowUpdate<'a> {
    line_number: usize,
    resolved: ResolvedWorkflowInfo<'a>,
}

/// Run the workflow engine over a transaction.
///
/// Returns the transaction unchanged when the engine is disabled, the
/// document does not change, the transaction was produced by the engine or
/// another task tool, or no workflow task was completed. Otherwise the
/// synthesized edits are merged in as follow-ups and the transaction is
/// tagged with [`WorkflowChangeKind::Transition`].
pub fn handle_workflow_transaction(tr: Transaction, ctx: &WorkflowContext<'_>) -> Transaction {
    if !ctx.settings.enabled || !tr.doc_changed() {
        return tr;
    }

    let guarded = tr
        .annotations()
        .iter()
        .any(|a| matches!(a, Annotation::WorkflowChange(_) | Annotation::PriorityChange));
    if guarded {
        return tr;
    }

    let followups = workflow_followups(&tr, ctx);
    if followups.is_empty() {
        return tr;
    }

    tracing::debug!(edits = followups.len(), "Workflow transition");
    tr.with_followups(followups, Annotation::WorkflowChange(WorkflowChangeKind::Transition))
}

fn workflow_followups(tr: &Transaction, ctx: &WorkflowContext<'_>) -> Vec<Change> {
    let doc = tr.new_doc();
    let mut changes = Vec::new();

    let insert_tasks = !tr.has_annotation(Annotation::StatusCascade(CascadeKind::AutoCompleteParent));

    for update in completed_workflow_tasks(tr, ctx) {
        let workflow = update.resolved.workflow;
        if workflow.stages.is_empty() {
            continue;
        }

        let line = doc.line(update.line_number);
        let workflow_type = update.resolved.workflow_type.as_str();

        changes.extend(process_timestamp_and_calculate_time(
            line.text,
            doc,
            line.from,
            line.number,
            workflow_type,
            ctx,
        ));

        if ctx.settings.auto_remove_last_stage_marker {
            if let Some(range) = find_stage_marker(line.text) {
                changes.push(Change::delete(line.from + range.start, line.from + range.end));
            }
        }

        let terminal = update.resolved.position.stage().is_some_and(WorkflowStage::is_terminal);
        if terminal {
            changes.extend(complete_root_task(doc, &line, workflow_type, ctx.statuses));
            continue;
        }

        if is_final_position(&update.resolved) {
            tracing::debug!(line = line.number, workflow = %workflow_type, "Workflow finished");
            continue;
        }

        let next = determine_next_stage(&update.resolved.position, workflow);
        let Some(next_stage) = workflow.stage(next.stage_id) else {
            continue;
        };
        let next_sub_stage = next.sub_stage_id.and_then(|id| next_stage.sub_stage(id));

        let indentation = get_indentation(line.text);
        let task_indentation = if update.resolved.is_root_task {
            format!("{indentation}{}", ctx.indent_unit)
        } else {
            indentation.to_string()
        };

        let text = generate_workflow_task_text(next_stage, &task_indentation, ctx, true, next_sub_stage);
        let at = determine_task_insertion_point(&line, doc, indentation);

        if insert_tasks {
            tracing::debug!(
                line = line.number,
                workflow = %workflow_type,
                stage = next.stage_id,
                sub_stage = next.sub_stage_id,
                "Creating next stage task"
            );
            changes.push(Change::insert(at, format!("\n{text}")));
        }
    }

    changes
}

/// Collect the workflow tasks a transaction marks complete, in document
/// order, one entry per line.
///
/// A change only counts when it writes over the checkbox status and leaves
/// the task complete in the new document.
fn completed_workflow_tasks<'r>(
    tr: &Transaction,
    ctx: &WorkflowContext<'r>,
) -> Vec<WorkflowUpdate<'r>> {
    let doc = tr.new_doc();
    let mut seen = BTreeSet::new();

    tr.iter_changes()
        .filter(|range| is_completion_change(range.inserted, ctx.statuses))
        .filter_map(|range| {
            let line = doc.line_at(range.from_b);
            let task = parse_task_line(line.text)?;
            let status_from = line.from + task.status_range.start;
            let status_to = line.from + task.status_range.end;

            let touches_status = range.from_b < status_to && range.to_b > status_from;
            (touches_status && ctx.statuses.is_completed(task.status)).then_some(line)
        })
        .filter(|line| seen.insert(line.number))
        .filter_map(|line| {
            let resolved = resolve_workflow_info(line.text, doc, line.number, ctx.registry);
            if resolved.is_none() {
                tracing::debug!(line = line.number, "Completed task is not a workflow task");
            }
            Some(WorkflowUpdate { line_number: line.number, resolved: resolved? })
        })
        .collect()
}

/// Mark the enclosing root task of a workflow complete.
///
/// The nearest line above that is indented less and carries the workflow's
/// tag is the root. Nothing happens if it is already complete.
fn complete_root_task(
    doc: &Document,
    line: &Line<'_>,
    workflow_type: &str,
    statuses: &TaskStatusConfig,
) -> Option<Change> {
    let indent = indent_width(line.text);

    let root = (1..line.number).rev().map(|n| doc.line(n)).find(|candidate| {
        indent_width(candidate.text) < indent && has_workflow_tag(candidate.text, workflow_type)
    })?;

    let task = parse_task_line(root.text)?;
    if statuses.is_completed(task.status) {
        return None;
    }

    tracing::debug!(line = root.number, workflow = %workflow_type, "Completing workflow root task");
    Some(Change::replace(
        root.from + task.status_range.start,
        root.from + task.status_range.end,
        statuses.completion_marker(),
    ))
}

/// Build the edits for a manual move of a task to another stage.
///
/// The task is marked complete, its time bookkeeping and stage marker are
/// handled as for an automatic transition, and unless the task is the last
/// of its workflow a task for `target` is inserted right after it. Leaving
/// a sub-stage for a main stage dedents the new task by one level.
pub fn create_stage_transition(
    doc: &Document,
    line_number: usize,
    target: &WorkflowStage,
    target_sub_stage: Option<&WorkflowSubStage>,
    is_root_task: bool,
    current_sub_stage: Option<&WorkflowSubStage>,
    ctx: &WorkflowContext<'_>,
) -> Vec<Change> {
    let line = doc.line(ensure_within_bounds(line_number, doc.lines()));
    let mut changes = Vec::new();

    let mut indentation = get_indentation(line.text).to_string();
    if is_root_task {
        indentation.push_str(ctx.indent_unit);
    }

    let is_final = is_last_workflow_stage_or_not_workflow(line.text, line.number, doc, ctx.registry);

    if let Some(task) = parse_task_line(line.text) {
        changes.push(Change::replace(
            line.from + task.status_range.start,
            line.from + task.status_range.end,
            ctx.statuses.completion_marker(),
        ));
    }

    let workflow_type = find_workflow_tag(line.text)
        .or_else(|| find_parent_workflow(doc, line.number))
        .unwrap_or_else(|| target.id.split(STAGE_SEPARATOR).next().unwrap_or_default());

    changes.extend(process_timestamp_and_calculate_time(
        line.text,
        doc,
        line.from,
        line.number,
        workflow_type,
        ctx,
    ));

    if current_sub_stage.is_some() && target_sub_stage.is_none() && !is_final {
        indentation = remove_trailing_indentation(&indentation, ctx.indent_unit, 1);
    }

    if !is_final {
        let text = generate_workflow_task_text(target, &indentation, ctx, true, target_sub_stage);
        changes.push(Change::insert(line.to, format!("\n{text}")));
    }

    if ctx.settings.auto_remove_last_stage_marker {
        if let Some(range) = find_stage_marker(line.text) {
            changes.push(Change::delete(line.from + range.start, line.from + range.end));
        }
    }

    changes
}

/// The workflow engine: configuration, registry and clock bundled behind a
/// transaction filter.
#[derive(Debug, Clone)]
pub struct WorkflowEngine<C = SystemClock> {
    config: Config,
    registry: WorkflowRegistry,
    indent_unit: String,
    clock: C,
}

impl WorkflowEngine<SystemClock> {
    /// Create an engine using the definitions from `config`.
    pub fn new(config: Config) -> Self {
        let registry = WorkflowRegistry::new(config.workflow.definitions.clone());
        let indent_unit = config.editor.indent_unit();
        Self { config, registry, indent_unit, clock: SystemClock }
    }
}

impl<C: Clock> WorkflowEngine<C> {
    /// Replace the clock.
    pub fn with_clock<D: Clock>(self, clock: D) -> WorkflowEngine<D> {
        WorkflowEngine {
            config: self.config,
            registry: self.registry,
            indent_unit: self.indent_unit,
            clock,
        }
    }

    /// Add definitions, replacing registered ones with the same id.
    pub fn with_definitions(mut self, definitions: Vec<WorkflowDefinition>) -> Self {
        self.registry.merge(definitions);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// A context for one pass, reading the clock once.
    pub fn context(&self) -> WorkflowContext<'_> {
        WorkflowContext::new(
            &self.config.workflow,
            &self.registry,
            &self.config.task_statuses,
            &self.indent_unit,
            self.clock.now(),
        )
    }

    /// Resolve the workflow position of a line.
    pub fn resolve<'a>(&'a self, doc: &Document, line_number: usize) -> Option<ResolvedWorkflowInfo<'a>> {
        let line = doc.line(ensure_within_bounds(line_number, doc.lines()));
        resolve_workflow_info(line.text, doc, line.number, &self.registry)
    }

    /// The transaction filter entry point.
    pub fn filter_transaction(&self, tr: Transaction) -> Transaction {
        handle_workflow_transaction(tr, &self.context())
    }

    /// Build the transaction for a manual move of a task to `stage_id`
    /// (optionally a sub-stage of it).
    ///
    /// Returns `None` when the line is not a resolvable workflow task or
    /// the target is unknown. The transaction is tagged so that the filter
    /// leaves it alone.
    pub fn move_to_stage(
        &self,
        doc: &Document,
        line_number: usize,
        stage_id: &str,
        sub_stage_id: Option<&str>,
    ) -> Option<Transaction> {
        let resolved = self.resolve(doc, line_number)?;
        let target = resolved.workflow.stage(stage_id)?;
        let target_sub_stage = match sub_stage_id {
            Some(id) => Some(target.sub_stage(id)?),
            None => None,
        };

        let ctx = self.context();
        let line = doc.line(ensure_within_bounds(line_number, doc.lines()));
        let kind = if is_final_position(&resolved) {
            WorkflowChangeKind::CompleteStage
        } else {
            WorkflowChangeKind::MoveToStage
        };

        let changes = create_stage_transition(
            doc,
            line.number,
            target,
            target_sub_stage,
            resolved.is_root_task,
            resolved.current_sub_stage(),
            &ctx,
        );

        Some(Transaction::new(doc.clone(), changes).with_annotation(Annotation::WorkflowChange(kind)))
    }

    /// Build the transaction that completes a task on a terminal stage
    /// together with its workflow's root task.
    ///
    /// Returns `None` unless the line resolves to a terminal stage.
    pub fn complete_workflow(&self, doc: &Document, line_number: usize) -> Option<Transaction> {
        let resolved = self.resolve(doc, line_number)?;
        let stage = resolved.position.stage().filter(|stage| stage.is_terminal())?;

        let ctx = self.context();
        let line = doc.line(ensure_within_bounds(line_number, doc.lines()));
        let mut changes = create_stage_transition(
            doc,
            line.number,
            stage,
            None,
            false,
            resolved.current_sub_stage(),
            &ctx,
        );
        changes.extend(complete_root_task(doc, &line, &resolved.workflow_type, ctx.statuses));

        tracing::debug!(line = line.number, workflow = %resolved.workflow_type, "Completing workflow");
        Some(
            Transaction::new(doc.clone(), changes)
                .with_annotation(Annotation::WorkflowChange(WorkflowChangeKind::CompleteWorkflow)),
        )
    }

    /// Build the transaction that inserts a child task at the same stage
    /// (and sub-stage) right below the line.
    ///
    /// Returns `None` for root tasks, terminal stages and non-workflow lines.
    pub fn add_child_with_same_stage(&self, doc: &Document, line_number: usize) -> Option<Transaction> {
        let resolved = self.resolve(doc, line_number)?;
        let stage = resolved.position.stage().filter(|stage| !stage.is_terminal())?;

        let ctx = self.context();
        let line = doc.line(ensure_within_bounds(line_number, doc.lines()));
        let indentation = format!("{}{}", get_indentation(line.text), ctx.indent_unit);
        let text =
            generate_workflow_task_text(stage, &indentation, &ctx, false, resolved.current_sub_stage());

        Some(
            Transaction::new(doc.clone(), vec![Change::insert(line.to, format!("\n{text}"))])
                .with_annotation(Annotation::WorkflowChange(WorkflowChangeKind::AddChild)),
        )
    }
}
