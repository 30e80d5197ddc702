use crate::source::{render_caret, Source, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateErrorKind {
    UnknownType(String),
    CyclicType(String),
    EnumOutOfRange { entry: String, value: String },
    BitfieldOverflow(String),
    BadPlacement(String),
    DuplicateMember(String),
    BadArraySize(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateError {
    pub kind: ValidateErrorKind,
    pub span: Span,
}

impl ValidateError {
    pub fn new(kind: ValidateErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn render(&self, source: &Source) -> String {
        render_caret(source, &self.span, &self.to_string())
    }
}

impl std::fmt::Display for ValidateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ValidateErrorKind::UnknownType(name) => write!(f, "unknown type '{name}'"),
            ValidateErrorKind::CyclicType(name) => {
                write!(f, "type '{name}' contains itself without indirection")
            }
            ValidateErrorKind::EnumOutOfRange { entry, value } => write!(
                f,
                "enum entry '{entry}' value {value} does not fit the underlying type"
            ),
            ValidateErrorKind::BitfieldOverflow(name) => {
                write!(f, "bitfield '{name}' exceeds its container's bit width")
            }
            ValidateErrorKind::BadPlacement(reason) => write!(f, "invalid placement: {reason}"),
            ValidateErrorKind::DuplicateMember(name) => {
                write!(f, "duplicate member name '{name}'")
            }
            ValidateErrorKind::BadArraySize(reason) => write!(f, "invalid array size: {reason}"),
        }
    }
}

impl std::error::Error for ValidateError {}
