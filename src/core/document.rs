//! Immutable document snapshots.
//!
//! A [`Document`] is the text the engine works against for a single
//! transaction. Lines are 1-based and separated by `\n`; every offset is a
//! byte offset into the full text.

/// A single line of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Line number (1-indexed)
    pub number: usize,
    /// Offset of the first byte of the line
    pub from: usize,
    /// Offset just past the last byte of the line, excluding the newline
    pub to: usize,
    /// Line content without the trailing newline
    pub text: &'a str,
}

/// An immutable text snapshot with a line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    line_starts: Vec<usize>,
}

impl Document {
    /// Create a document from text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    /// The full document text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length of the document in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the document holds no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of lines. An empty document still has one (empty) line.
    pub fn lines(&self) -> usize {
        self.line_starts.len()
    }

    /// Get a line by its 1-based number, clamped to `[1, lines]`.
    pub fn line(&self, number: usize) -> Line<'_> {
        let number = ensure_within_bounds(number, self.lines());
        let from = self.line_starts[number - 1];
        let to = self.line_starts.get(number).map_or(self.text.len(), |next| next - 1);

        Line { number, from, to, text: &self.text[from..to] }
    }

    /// Get the line containing the given offset.
    pub fn line_at(&self, offset: usize) -> Line<'_> {
        let offset = offset.min(self.text.len());
        let index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        self.line(index + 1)
    }

    /// Iterate over all lines in order.
    pub fn iter_lines(&self) -> impl DoubleEndedIterator<Item = Line<'_>> + '_ {
        (1..=self.lines()).map(move |n| self.line(n))
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Leading whitespace of a line.
pub fn get_indentation(text: &str) -> &str {
    let end = text.len() - text.trim_start().len();
    &text[..end]
}

/// Width of a line's leading whitespace, counted in characters.
///
/// A tab counts as one, same as a space.
pub fn indent_width(text: &str) -> usize {
    get_indentation(text).chars().count()
}

/// Clamp a 1-based line number into `[1, lines]`.
pub fn ensure_within_bounds(line_number: usize, lines: usize) -> usize {
    line_number.clamp(1, lines.max(1))
}

/// Remove `levels` indent units from the end of an indentation string.
///
/// Falls back to dropping the same number of characters when the
/// indentation does not end with the unit (mixed tabs and spaces).
pub fn remove_trailing_indentation(indentation: &str, unit: &str, levels: usize) -> String {
    let removal = unit.repeat(levels);

    if let Some(stripped) = indentation.strip_suffix(removal.as_str()) {
        return stripped.to_string();
    }

    let keep = indentation.chars().count().saturating_sub(unit.chars().count() * levels);
    indentation.chars().take(keep).collect()
}
