//! The syntax tree produced by [`crate::parser::parse`] (§4 "Grammar").

use serde::Serialize;

pub mod attribute;
pub mod decl;
pub mod expr;
pub mod stmt;
pub mod udt;

pub use attribute::{Attributable, Attribute};
pub use decl::{ArrayLen, Direction, FnDecl, ImportDecl, NamespaceDecl, Param, TypedefDecl, VarDecl};
pub use expr::{Expr, MathOp, Operand, PathHead, PathSegment, RValuePath, ScopeResolutionPath, TypeRef, UnaryOp};
pub use stmt::{Assignment, Stmt};
pub use udt::{BitfieldDecl, BitfieldEntry, EnumDecl, EnumEntry, Member, UdtDecl, UdtKind};

/// A single top-level (or namespace-nested) declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Item {
    Udt(UdtDecl),
    Enum(EnumDecl),
    Bitfield(BitfieldDecl),
    Typedef(TypedefDecl),
    Function(FnDecl),
    Var(VarDecl),
    Namespace(NamespaceDecl),
    Import(ImportDecl),
}

impl Item {
    pub fn span(&self) -> crate::source::Span {
        match self {
            Item::Udt(d) => d.span,
            Item::Enum(d) => d.span,
            Item::Bitfield(d) => d.span,
            Item::Typedef(d) => d.span,
            Item::Function(d) => d.span,
            Item::Var(d) => d.span,
            Item::Namespace(d) => d.span,
            Item::Import(d) => d.span,
        }
    }

    /// The name this item binds in its enclosing scope, for duplicate and
    /// cyclic-reference checks (§5 "Validator").
    pub fn name(&self) -> &str {
        match self {
            Item::Udt(d) => &d.name,
            Item::Enum(d) => &d.name,
            Item::Bitfield(d) => &d.name,
            Item::Typedef(d) => &d.name,
            Item::Function(d) => &d.name,
            Item::Var(d) => &d.name,
            Item::Namespace(d) => d.path.last().map(String::as_str).unwrap_or(""),
            Item::Import(d) => &d.path,
        }
    }
}

/// A fully parsed program: the flat sequence of top-level items in source
/// order, after namespaces have nested their own items but before any
/// semantic validation has run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Program {
    pub items: Vec<Item>,
}
