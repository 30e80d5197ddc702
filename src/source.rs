//! Source text and locations (§3 "Source location").

use std::fmt::Display;
use std::sync::Arc;

use serde::Serialize;

/// Identifies one loaded file (the main program or an `#include`d one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceId(pub usize);

/// A loaded source file: its name (for diagnostics) and its text.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    pub name: Arc<str>,
    pub text: Arc<str>,
}

impl Source {
    pub fn new(name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            id: SourceId(0),
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn with_id(name: impl Into<Arc<str>>, text: impl Into<Arc<str>>, id: SourceId) -> Self {
        Self {
            id,
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn line(&self, line: usize) -> &str {
        self.text.lines().nth(line.saturating_sub(1)).unwrap_or("")
    }
}

/// `(source-id, line>=1, column>=1, length>=0)`. Every token and every
/// diagnostic carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub source: SourceId,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(source: SourceId, line: usize, column: usize, length: usize) -> Self {
        Self {
            source,
            line,
            column,
            length,
        }
    }

    /// The dummy span used for synthesized nodes (e.g. an evaluator-created
    /// padding pattern with no source counterpart).
    pub fn synthetic() -> Self {
        Self::new(SourceId(usize::MAX), 0, 0, 0)
    }
}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.line, self.column).cmp(&(other.line, other.column))
    }
}

/// A human-facing `(line, column)` pair, as rendered in error messages.
pub type Location = (usize, usize);

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Render `message` with a caret underline beneath `span`, in the style of
/// the teacher's `ParseError::fmt` (one line of context above, the offending
/// line, then a padded `^^^` underline colored red).
pub fn render_caret(source: &Source, span: &Span, message: &str) -> String {
    use colored::Colorize;

    let prev_line = if span.line > 1 { source.line(span.line - 1) } else { "" };
    let line_str = source.line(span.line);

    let margin = format!("{}", span.line).len();
    let margin_fill = " ".repeat(margin);
    let padding = " ".repeat(span.column.saturating_sub(1));
    let underline = "^".repeat(span.length.max(1)).red();

    format!(
        "{margin_fill} |{prev_line}\n{line} |{line_str}\n{margin_fill} |{padding}{underline} {message}",
        line = span.line,
    )
}
