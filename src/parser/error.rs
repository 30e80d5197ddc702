use crate::source::{render_caret, Source, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn eof(item: &str, span: Span) -> Self {
        Self::new(format!("hit end of file while parsing {item}"), span)
    }

    pub fn unexpected(expected: &str, found: impl std::fmt::Display, span: Span) -> Self {
        Self::new(format!("expected {expected}, found `{found}`"), span)
    }

    pub fn render(&self, source: &Source) -> String {
        render_caret(source, &self.span, &self.message)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl std::error::Error for ParseError {}
