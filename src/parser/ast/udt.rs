use serde::Serialize;

use super::attribute::{Attributable, Attribute};
use super::decl::VarDecl;
use super::expr::{Expr, TypeRef};
use crate::source::Span;

/// A member of a `struct`/`union` body. Plain fields reuse [`VarDecl`];
/// `if`/`else` bodies let a struct branch its layout on already-placed
/// sibling data (§4.2 "Conditional members").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Member {
    Field(VarDecl),
    Conditional {
        condition: Expr,
        then_branch: Vec<Member>,
        else_branch: Vec<Member>,
        span: Span,
    },
    /// A padding-only `padding[n];` shorthand.
    Padding { count: Expr, span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UdtKind {
    Struct,
    Union,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UdtDecl {
    pub kind: UdtKind,
    pub name: String,
    pub template_params: Vec<String>,
    pub inherits: Vec<TypeRef>,
    pub members: Vec<Member>,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl Attributable for UdtDecl {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

/// One `name = value` or `name` (auto-incrementing) entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumEntry {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumDecl {
    pub name: String,
    pub underlying: TypeRef,
    pub entries: Vec<EnumEntry>,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl Attributable for EnumDecl {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

/// A single named run of bits inside a `bitfield` body. `size` is in
/// bits, not bytes (§4.2 "Bitfields").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitfieldEntry {
    pub name: String,
    pub size: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitfieldDecl {
    pub name: String,
    pub entries: Vec<BitfieldEntry>,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl Attributable for BitfieldDecl {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}
