//! Edit transactions.
//!
//! A [`Transaction`] models one edit a host editor is about to apply: a set
//! of atomic changes against a start document, the annotations describing
//! where the edit came from, and any follow-up changes a filter added. The
//! follow-ups are expressed against the post-change document and applied
//! together in one step.

use super::document::Document;

/// A single text replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Start offset (inclusive)
    pub from: usize,
    /// End offset (exclusive)
    pub to: usize,
    /// Replacement text
    pub insert: String,
}

impl Change {
    /// Insert text at an offset.
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self { from: at, to: at, insert: text.into() }
    }

    /// Delete a range.
    pub fn delete(from: usize, to: usize) -> Self {
        Self { from, to, insert: String::new() }
    }

    /// Replace a range with text.
    pub fn replace(from: usize, to: usize, text: impl Into<String>) -> Self {
        Self { from, to, insert: text.into() }
    }

    /// Whether applying this change would leave the text untouched.
    pub fn is_empty(&self) -> bool {
        self.from == self.to && self.insert.is_empty()
    }
}

/// One changed range, in both start-document (`a`) and post-change (`b`)
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange<'a> {
    pub from_a: usize,
    pub to_a: usize,
    pub from_b: usize,
    pub to_b: usize,
    pub inserted: &'a str,
}

/// Kinds of edits produced by the workflow engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowChangeKind {
    /// Automatic transition after a task was marked complete
    Transition,
    /// Manual move to a chosen stage
    MoveToStage,
    /// Manual completion of the last stage
    CompleteStage,
    /// Manual completion of a whole workflow
    CompleteWorkflow,
    /// Manual insertion of a child task at the current stage
    AddChild,
}

/// Kinds of status-cascade edits produced by other task tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeKind {
    /// A parent task was completed because all of its children were
    AutoCompleteParent,
    /// A status was cycled by a status switcher
    StatusCycle,
}

/// Where an edit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// Edit synthesized by the workflow engine
    WorkflowChange(WorkflowChangeKind),
    /// Priority picker change
    PriorityChange,
    /// Status cascade from other task tooling
    StatusCascade(CascadeKind),
}

/// An edit about to be applied to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    start: Document,
    changes: Vec<Change>,
    new_doc: Document,
    followups: Vec<Change>,
    annotations: Vec<Annotation>,
}

impl Transaction {
    /// Create a transaction from changes expressed against `start`.
    ///
    /// Changes are applied simultaneously; overlapping or out-of-bounds
    /// changes are dropped.
    pub fn new(start: Document, changes: Vec<Change>) -> Self {
        let changes = normalize_changes(start.as_str(), changes);
        let new_doc = Document::new(splice(start.as_str(), &changes));

        Self { start, changes, new_doc, followups: Vec::new(), annotations: Vec::new() }
    }

    /// Attach an annotation.
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// The document before this transaction.
    pub fn start_doc(&self) -> &Document {
        &self.start
    }

    /// The document after the initial changes, before any follow-ups.
    pub fn new_doc(&self) -> &Document {
        &self.new_doc
    }

    /// The initial changes, sorted by position.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Follow-up changes added by a filter, against [`Self::new_doc`].
    pub fn followups(&self) -> &[Change] {
        &self.followups
    }

    /// Annotations attached to this transaction.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Check whether an annotation is attached.
    pub fn has_annotation(&self, annotation: Annotation) -> bool {
        self.annotations.contains(&annotation)
    }

    /// Whether the transaction changes the document at all.
    pub fn doc_changed(&self) -> bool {
        self.changes.iter().any(|c| !c.is_empty())
    }

    /// Whether a filter added follow-up changes.
    pub fn is_augmented(&self) -> bool {
        !self.followups.is_empty()
    }

    /// Iterate over changed ranges in document order.
    pub fn iter_changes(&self) -> impl Iterator<Item = ChangedRange<'_>> + '_ {
        let mut delta: isize = 0;
        self.changes.iter().map(move |change| {
            let from_b = offset_by(change.from, delta);
            let to_b = from_b + change.insert.len();
            delta += change.insert.len() as isize - (change.to - change.from) as isize;

            ChangedRange {
                from_a: change.from,
                to_a: change.to,
                from_b,
                to_b,
                inserted: change.insert.as_str(),
            }
        })
    }

    /// Merge follow-up changes into this transaction and tag it.
    pub fn with_followups(mut self, followups: Vec<Change>, annotation: Annotation) -> Self {
        self.followups.extend(followups);
        self.annotations.push(annotation);
        self
    }

    /// The final document: initial changes, then follow-ups.
    pub fn apply(&self) -> Document {
        if self.followups.is_empty() {
            return self.new_doc.clone();
        }
        Document::new(apply_changes(self.new_doc.as_str(), &self.followups))
    }
}

/// Apply simultaneous changes to a text.
///
/// Changes are ordered by start offset; changes with the same start keep
/// their given order, so an insertion listed before a deletion at the same
/// offset lands in front of it. A change that starts inside a range already
/// consumed is dropped.
pub fn apply_changes(text: &str, changes: &[Change]) -> String {
    splice(text, &normalize_changes(text, changes.to_vec()))
}

fn normalize_changes(text: &str, mut changes: Vec<Change>) -> Vec<Change> {
    changes.sort_by_key(|c| c.from);

    let mut accepted: Vec<Change> = Vec::with_capacity(changes.len());
    let mut consumed = 0;

    for change in changes {
        let in_bounds = change.from <= change.to
            && change.to <= text.len()
            && text.is_char_boundary(change.from)
            && text.is_char_boundary(change.to);

        if !in_bounds || change.from < consumed {
            tracing::debug!(
                from = change.from,
                to = change.to,
                "Dropping overlapping or out-of-bounds change"
            );
            continue;
        }

        consumed = change.to;
        accepted.push(change);
    }

    accepted
}

fn splice(text: &str, changes: &[Change]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    for change in changes {
        out.push_str(&text[pos..change.from]);
        out.push_str(&change.insert);
        pos = change.to;
    }

    out.push_str(&text[pos..]);
    out
}

fn offset_by(offset: usize, delta: isize) -> usize {
    offset.checked_add_signed(delta).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_doc_applies_changes() {
        let tr = Transaction::new(Document::new("- [ ] task"), vec![Change::replace(3, 4, "x")]);

        assert!(tr.doc_changed());
        assert_eq!(tr.new_doc().as_str(), "- [x] task");
        assert_eq!(tr.apply().as_str(), "- [x] task");
    }

    #[test]
    fn test_iter_changes_maps_offsets() {
        let tr = Transaction::new(
            Document::new("aaa bbb ccc"),
            vec![Change::replace(8, 11, "z"), Change::insert(0, ">> ")],
        );

        let ranges: Vec<_> = tr.iter_changes().collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].from_a, ranges[0].from_b, ranges[0].to_b), (0, 0, 3));
        assert_eq!((ranges[1].from_a, ranges[1].from_b, ranges[1].to_b), (8, 11, 12));
        assert_eq!(ranges[1].inserted, "z");
        assert_eq!(tr.new_doc().as_str(), ">> aaa bbb z");
    }

    #[test]
    fn test_empty_change_is_not_a_doc_change() {
        let tr = Transaction::new(Document::new("text"), vec![Change::insert(2, "")]);
        assert!(!tr.doc_changed());
    }

    #[test]
    fn test_apply_changes_keeps_insert_before_delete_at_same_offset() {
        let text = "Plan [stage::plan]";
        let changes = vec![Change::insert(4, " (done)"), Change::delete(4, 18)];

        assert_eq!(apply_changes(text, &changes), "Plan (done)");
    }

    #[test]
    fn test_apply_changes_drops_overlaps() {
        let changes = vec![Change::delete(0, 5), Change::replace(2, 3, "X")];
        assert_eq!(apply_changes("hello world", &changes), " world");
    }

    #[test]
    fn test_apply_changes_drops_out_of_bounds() {
        let changes = vec![Change::insert(100, "nope"), Change::insert(5, "!")];
        assert_eq!(apply_changes("hello", &changes), "hello!");
    }

    #[test]
    fn test_followups_are_applied_after_changes() {
        let tr = Transaction::new(Document::new("- [ ] a"), vec![Change::replace(3, 4, "x")])
            .with_followups(
                vec![Change::insert(7, "\n- [ ] b")],
                Annotation::WorkflowChange(WorkflowChangeKind::Transition),
            );

        assert!(tr.is_augmented());
        assert!(tr.has_annotation(Annotation::WorkflowChange(WorkflowChangeKind::Transition)));
        assert_eq!(tr.apply().as_str(), "- [x] a\n- [ ] b");
    }
}
