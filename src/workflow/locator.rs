//! Parent workflow lookup.

use crate::core::{ensure_within_bounds, indent_width, Document};

use super::markers::find_workflow_tag;

/// Find the workflow a line belongs to by scanning upward for a root tag.
///
/// A tagged line qualifies when it is indented less than the starting line,
/// or equally indented and strictly above it. The first qualifying line wins,
/// giving the innermost enclosing (or nearest same-level) workflow. Line
/// numbers are 1-based; lines at or before the first line have no parent.
pub fn find_parent_workflow(doc: &Document, line_number: usize) -> Option<&str> {
    if line_number <= 1 {
        return None;
    }

    let line_number = ensure_within_bounds(line_number, doc.lines());
    if line_number <= 1 {
        return None;
    }

    let current_indent = indent_width(doc.line(line_number).text);

    (1..=line_number).rev().map(|n| doc.line(n)).find_map(|line| {
        let workflow = find_workflow_tag(line.text)?;
        let indent = indent_width(line.text);

        let encloses = indent < current_indent
            || (indent == current_indent && line.number < line_number);
        encloses.then_some(workflow)
    })
}
