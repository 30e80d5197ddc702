use serde::Serialize;

use super::attribute::{Attributable, Attribute};
use super::expr::{Expr, TypeRef};
use crate::source::Span;

/// How many elements a declared array has (§4.2 "Array declarations").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ArrayLen {
    /// `type name[n]`
    Fixed(Expr),
    /// `type name[]` — read until the unbounded-array termination rule
    /// (SPEC_FULL §E) says stop.
    Unbounded,
    /// `type name[while(cond)]`
    While(Expr),
}

/// `in`/`out` direction on a function parameter or a top-level `in`/`out`
/// variable declaration (§4.2 "Interface variables").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    In,
    Out,
}

/// A single `type name [= init] [@ address] [in [[attr]]];`-shaped
/// declaration. Covers plain member declarations, placed variables, and
/// local variables uniformly; which combination of optional fields is
/// populated is what the validator uses to tell them apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub ty: TypeRef,
    pub name: String,
    pub array: Option<ArrayLen>,
    pub initializer: Option<Expr>,
    pub placement: Option<Expr>,
    pub direction: Option<Direction>,
    /// `: SIZE_TYPE` on a `T *name : SIZE_TYPE;` pointer declaration; `ty`
    /// holds the pointee type in that case (§4.3 "Pointers").
    pub pointer_size: Option<TypeRef>,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl Attributable for VarDecl {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub ty: TypeRef,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<super::stmt::Stmt>,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl Attributable for FnDecl {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

/// `using Name = Type;` or the generic-template form `using Name<T> = Type;`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedefDecl {
    pub name: String,
    pub template_params: Vec<String>,
    pub target: TypeRef,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamespaceDecl {
    pub path: Vec<String>,
    pub body: Vec<super::Item>,
    pub span: Span,
}

/// `#include`-adjacent source import recorded as an AST node so the
/// highlighter can still see it after preprocessing strips the directive
/// (SPEC_FULL §C).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDecl {
    pub path: String,
    pub span: Span,
}
