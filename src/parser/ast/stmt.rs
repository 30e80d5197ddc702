use serde::Serialize;

use super::decl::VarDecl;
use super::expr::{Expr, MathOp};
use crate::source::Span;

/// A compound assignment (`+=`, `&=`, ...) decomposes during parsing into
/// its underlying [`MathOp`] plus a plain `Assign`; `op` is `None` for a
/// bare `=`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub target: Expr,
    pub op: Option<MathOp>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    VarDecl(VarDecl),
    Assign(Assignment),
    Expr(Expr, Span),
    Return(Option<Expr>, Span),
    Break(Span),
    Continue(Span),
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    /// The desugared form of `for (init; cond; step) body`: `init` runs
    /// once before a `While` whose body has `step` appended. Kept as its
    /// own node only until lowering runs; the validator and evaluator
    /// never see raw `for` syntax after parsing.
    Block(Vec<Stmt>, Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl(d) => d.span,
            Stmt::Assign(a) => a.span,
            Stmt::Expr(_, s) => *s,
            Stmt::Return(_, s) => *s,
            Stmt::Break(s) => *s,
            Stmt::Continue(s) => *s,
            Stmt::If { span, .. } => *span,
            Stmt::While { span, .. } => *span,
            Stmt::Block(_, s) => *s,
        }
    }
}
