use serde::Serialize;

use crate::source::Span;

/// `[[name]]` or `[[name("value")]]` metadata attached to the declaration
/// that follows it (§4.3 "Attributes").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
    pub span: Span,
}

/// Mixin implemented by every declaration node that can carry attributes.
pub trait Attributable {
    fn attributes(&self) -> &[Attribute];
}
