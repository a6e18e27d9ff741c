//! Start timestamps and spent-time bookkeeping.
//!
//! Timestamps are written as `🛫 <datetime>` using moment-style format
//! tokens (`YYYY-MM-DD HH:mm:ss`). Completed stages get a `(⏱️ HH:mm:ss)`
//! annotation, and the final stage of a workflow may get a
//! `(Total: HH:mm:ss)` annotation summing every stage above it.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::core::{indent_width, Change, Document};

use super::context::WorkflowContext;
use super::markers::{find_stage_marker, find_time_spent, has_workflow_tag};
use super::transition::is_last_workflow_stage_or_not_workflow;

/// Glyph that prefixes a start timestamp.
pub const START_GLYPH: &str = "🛫";

/// Errors from reading timestamps and spent-time values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeFormatError {
    #[error("timestamp '{value}' does not match format '{format}'")]
    InvalidTimestamp { value: String, format: String },

    #[error("invalid spent time '{0}'")]
    InvalidSpentTime(String),
}

/// Moment-style tokens and their strftime equivalents, longest first.
const FORMAT_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%P"),
];

/// Translate a moment-style format into a chrono strftime format.
///
/// Text in `[brackets]` is copied literally.
pub fn moment_to_strftime(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;

    'outer: while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end].replace('%', "%%"));
                rest = &rest[end + 1..];
                continue;
            }
        }

        for (token, spec) in FORMAT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }

        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}

/// Format a datetime with a moment-style format.
pub fn format_timestamp(datetime: NaiveDateTime, format: &str) -> String {
    datetime.format(&moment_to_strftime(format)).to_string()
}

/// Parse a datetime strictly against a moment-style format.
///
/// Formats without a time part parse to midnight.
pub fn parse_timestamp(value: &str, format: &str) -> Result<NaiveDateTime, TimeFormatError> {
    let strftime = moment_to_strftime(format);

    NaiveDateTime::parse_from_str(value, &strftime)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, &strftime)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| TimeFormatError::InvalidTimestamp {
            value: value.to_string(),
            format: format.to_string(),
        })
}

/// The `🛫 <datetime>` token for a moment in time.
pub fn timestamp_token(datetime: NaiveDateTime, format: &str) -> String {
    format!("{START_GLYPH} {}", format_timestamp(datetime, format))
}

/// Format a duration with `HH`/`mm`/`ss` tokens.
///
/// Hours are not wrapped at a day. Without an hour token, minutes carry
/// the full duration. Negative durations format as zero.
pub fn format_duration(duration: Duration, format: &str) -> String {
    let total = duration.num_seconds().max(0);
    let has_hours = format.contains('H') || format.contains('h');

    let hours = total / 3600;
    let minutes = if has_hours { (total % 3600) / 60 } else { total / 60 };
    let seconds = total % 60;

    let mut out = String::with_capacity(format.len());
    let mut rest = format;

    while let Some(c) = rest.chars().next() {
        let run = rest.len() - rest.trim_start_matches(c).len();
        let (value, padded) = match (c, run) {
            ('H' | 'h', 1) => (Some(hours), false),
            ('H' | 'h', _) => (Some(hours), true),
            ('m', 1) => (Some(minutes), false),
            ('m', _) => (Some(minutes), true),
            ('s', 1) => (Some(seconds), false),
            ('s', _) => (Some(seconds), true),
            _ => (None, false),
        };

        match value {
            Some(value) if padded => out.push_str(&format!("{value:02}")),
            Some(value) => out.push_str(&value.to_string()),
            None => out.push_str(&rest[..run]),
        }
        rest = &rest[run..];
    }

    out
}

/// Parse a spent-time value: `HH:mm:ss` or `mm:ss`.
pub fn parse_spent_time(value: &str) -> Result<Duration, TimeFormatError> {
    let invalid = || TimeFormatError::InvalidSpentTime(value.to_string());

    let parts = value
        .split(':')
        .map(|part| part.parse::<i64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    let seconds = match parts.as_slice() {
        [h, m, s] => h * 3600 + m * 60 + s,
        [m, s] => m * 60 + s,
        _ => return Err(invalid()),
    };

    Ok(Duration::seconds(seconds))
}

/// Compute the timestamp and spent-time edits for a completed task line.
///
/// Returns nothing when the line has no start timestamp or the timestamp
/// does not parse with the configured format. Offsets are absolute, based
/// on `line_from`.
pub fn process_timestamp_and_calculate_time(
    line_text: &str,
    doc: &Document,
    line_from: usize,
    line_number: usize,
    workflow_type: &str,
    ctx: &WorkflowContext<'_>,
) -> Vec<Change> {
    let mut changes = Vec::new();
    let settings = ctx.settings;

    let Some(glyph_index) = line_text.find(START_GLYPH) else {
        return changes;
    };

    let format = settings.timestamp_format();
    let token_len = timestamp_token(ctx.now, format).len();
    let mut token_end = (glyph_index + token_len).min(line_text.len());
    while !line_text.is_char_boundary(token_end) {
        token_end -= 1;
    }

    let token = &line_text[glyph_index..token_end];
    let value = token.trim_start_matches(START_GLYPH).trim_start();

    let start = match parse_timestamp(value, format) {
        Ok(start) => start,
        Err(e) => {
            tracing::debug!(line = line_number, error = %e, "Skipping time bookkeeping");
            return changes;
        }
    };

    let elapsed = (ctx.now - start).max(Duration::zero());
    let is_final = is_last_workflow_stage_or_not_workflow(line_text, line_number, doc, ctx.registry);

    if settings.remove_timestamp_on_transition {
        let separator = line_text[..glyph_index]
            .chars()
            .next_back()
            .filter(|c| c.is_whitespace())
            .map_or(0, char::len_utf8);

        changes.push(Change::delete(
            line_from + glyph_index - separator,
            line_from + token_end,
        ));
    }

    if !settings.calculate_spent_time {
        return changes;
    }

    let insert_at =
        line_from + find_stage_marker(line_text).map_or(line_text.len(), |range| range.start);
    let spent_format = &settings.spent_time_format;

    if !is_final || !settings.calculate_full_spent_time {
        changes.push(Change::insert(
            insert_at,
            format!(" (⏱️ {})", format_duration(elapsed, spent_format)),
        ));
    }

    if is_final && settings.calculate_full_spent_time {
        let total = match recorded_workflow_time(line_text, doc, line_number, workflow_type) {
            Some(recorded) => recorded + elapsed,
            None => elapsed,
        };

        changes.push(Change::insert(
            insert_at,
            format!(" (Total: {})", format_duration(total, spent_format)),
        ));
    }

    changes
}

/// Sum the `(⏱️ ...)` annotations between the workflow's root line and the
/// current line, counting only lines at or above the current indentation.
fn recorded_workflow_time(
    line_text: &str,
    doc: &Document,
    line_number: usize,
    workflow_type: &str,
) -> Option<Duration> {
    let current_indent = indent_width(line_text);
    let last = line_number.min(doc.lines());

    let root = (1..line_number.min(doc.lines() + 1))
        .rev()
        .find(|&n| has_workflow_tag(doc.line(n).text, workflow_type))?;

    let recorded: Vec<Duration> = (root..=last)
        .map(|n| doc.line(n).text)
        .filter(|text| indent_width(text) <= current_indent)
        .filter_map(find_time_spent)
        .filter_map(|value| parse_spent_time(value).ok())
        .filter(|spent| *spent > Duration::zero())
        .collect();

    if recorded.is_empty() {
        return None;
    }

    Some(recorded.into_iter().fold(Duration::zero(), |acc, spent| acc + spent))
}
