use std::error::Error;
use std::fmt::Display;

use crate::source::{Source, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    InvalidCharacter(char),
    UnterminatedString,
    UnterminatedChar,
    UnterminatedComment,
    InvalidEscape(String),
    NumericOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    pub fn new(kind: LexErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Render with a caret underline beneath the offending span, the way the
    /// parser's own errors are rendered.
    pub fn render(&self, source: &Source) -> String {
        crate::source::render_caret(source, &self.span, &self.to_string())
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            LexErrorKind::InvalidCharacter(c) => write!(f, "invalid character '{c}'"),
            LexErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            LexErrorKind::UnterminatedChar => write!(f, "unterminated char literal"),
            LexErrorKind::UnterminatedComment => write!(f, "unterminated block comment"),
            LexErrorKind::InvalidEscape(seq) => write!(f, "invalid escape sequence '\\{seq}'"),
            LexErrorKind::NumericOutOfRange(text) => {
                write!(f, "numeric literal '{text}' does not fit in 128 bits")
            }
        }
    }
}

impl Error for LexError {}
