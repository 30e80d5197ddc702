use std::error::Error;
use std::fmt::Display;

use crate::source::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreprocessErrorKind {
    IncludeNotFound(String),
    IncludeCycle(String),
    UnmatchedEndif,
    UnterminatedConditional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessError {
    pub kind: PreprocessErrorKind,
    pub span: Span,
}

impl PreprocessError {
    pub fn new(kind: PreprocessErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl Display for PreprocessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            PreprocessErrorKind::IncludeNotFound(path) => {
                write!(f, "could not find include '{path}'")
            }
            PreprocessErrorKind::IncludeCycle(path) => {
                write!(f, "cyclic include detected for '{path}'")
            }
            PreprocessErrorKind::UnmatchedEndif => write!(f, "unmatched #endif"),
            PreprocessErrorKind::UnterminatedConditional => {
                write!(f, "unterminated #ifdef/#ifndef (missing #endif)")
            }
        }
    }
}

impl Error for PreprocessError {}
