use serde::Serialize;

use crate::lexer::ValueType;
use crate::source::Span;
use crate::value::Literal;

/// A single hop in an identifier chain (`a.b[2].c`, §4.6 "RValue
/// resolution").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PathSegment {
    Member(String),
    Index(Box<Expr>),
}

/// What an identifier chain starts from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PathHead {
    Ident(String),
    /// bare `$` — the current `data-offset`.
    CurrentOffset,
    This,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RValuePath {
    pub head: PathHead,
    pub segments: Vec<PathSegment>,
    pub span: Span,
}

/// `A::B::C`; `leading_root` records a leading `::` anchoring at the
/// program root rather than the enclosing namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeResolutionPath {
    pub segments: Vec<String>,
    pub leading_root: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogXor,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
}

/// A type name as it appears in an operand to `sizeof`/`addressof`, or as
/// the type half of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeRef {
    Builtin(ValueType, Span),
    Named(ScopeResolutionPath),
}

impl TypeRef {
    pub fn span(&self) -> Span {
        match self {
            TypeRef::Builtin(_, span) => *span,
            TypeRef::Named(path) => path.span,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            TypeRef::Builtin(v, _) => format!("{v:?}").to_lowercase(),
            TypeRef::Named(path) => path.segments.join("::"),
        }
    }
}

/// The operand to `sizeof`/`addressof`: either a bare type name or a full
/// expression (§4.6 "Type-operator semantics").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    Type(TypeRef),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Literal(Literal, Span),
    RValue(RValuePath),
    ScopeResolution(ScopeResolutionPath),
    Unary(UnaryOp, Box<Expr>, Span),
    Math(Box<Expr>, MathOp, Box<Expr>, Span),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>, Span),
    FunctionCall(String, Vec<Expr>, Span),
    SizeOf(Operand, Span),
    AddressOf(Operand, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s) => *s,
            Expr::RValue(p) => p.span,
            Expr::ScopeResolution(p) => p.span,
            Expr::Unary(_, _, s) => *s,
            Expr::Math(_, _, _, s) => *s,
            Expr::Ternary(_, _, _, s) => *s,
            Expr::FunctionCall(_, _, s) => *s,
            Expr::SizeOf(_, s) => *s,
            Expr::AddressOf(_, s) => *s,
        }
    }
}
