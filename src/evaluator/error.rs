use crate::source::{render_caret, Source, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    DivisionByZero,
    InvalidOperand(String),
    InvalidFloatOp(String),
    IndexOutOfBounds { index: i128, len: u64 },
    TypeMismatch(String),
    ArityMismatch { name: String, expected: String, got: usize },
    NoSuchVariable(String),
    NoSuchFunction(String),
    InvalidPlacement(String),
    RecursionLimit,
    PatternLimit,
    Cancelled,
    ProviderUnreadable(String),
    BadArraySize(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Span,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn render(&self, source: &Source) -> String {
        render_caret(source, &self.span, &self.to_string())
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            EvalErrorKind::DivisionByZero => write!(f, "division or modulo by zero"),
            EvalErrorKind::InvalidOperand(msg) => write!(f, "invalid operand: {msg}"),
            EvalErrorKind::InvalidFloatOp(op) => {
                write!(f, "'{op}' is not defined on floating-point operands")
            }
            EvalErrorKind::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds (length {len})")
            }
            EvalErrorKind::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            EvalErrorKind::ArityMismatch { name, expected, got } => write!(
                f,
                "'{name}' expects {expected} argument(s), got {got}"
            ),
            EvalErrorKind::NoSuchVariable(name) => write!(f, "no such variable '{name}'"),
            EvalErrorKind::NoSuchFunction(name) => write!(f, "no such function '{name}'"),
            EvalErrorKind::InvalidPlacement(msg) => write!(f, "invalid placement: {msg}"),
            EvalErrorKind::RecursionLimit => write!(f, "recursion limit exceeded"),
            EvalErrorKind::PatternLimit => write!(f, "pattern count limit exceeded"),
            EvalErrorKind::Cancelled => write!(f, "evaluation cancelled"),
            EvalErrorKind::ProviderUnreadable(msg) => write!(f, "provider unreadable: {msg}"),
            EvalErrorKind::BadArraySize(msg) => write!(f, "invalid array size: {msg}"),
        }
    }
}

impl std::error::Error for EvalError {}
