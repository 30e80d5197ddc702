//! The runtime value every expression evaluates to (§3 "Literal value").

use std::sync::Arc;

use serde::Serialize;

use crate::pattern::Pattern;

/// A tagged sum over every value the pattern language can compute. The
/// widest numeric carriers are 128 bits; narrower reads are sign- or
/// zero-extended into them (§3).
#[derive(Debug, Clone, Serialize)]
pub enum Literal {
    Unsigned(u128),
    Signed(i128),
    Float(f64),
    Boolean(bool),
    Char(char),
    Char16(u16),
    Str(String),
    /// A value that is itself a previously-created pattern, e.g. the result
    /// of `sizeof`'s scratch evaluation or a function returning a struct.
    Pattern(Arc<Pattern>),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Unsigned(_) => "unsigned",
            Literal::Signed(_) => "signed",
            Literal::Float(_) => "float",
            Literal::Boolean(_) => "bool",
            Literal::Char(_) => "char",
            Literal::Char16(_) => "char16",
            Literal::Str(_) => "str",
            Literal::Pattern(_) => "pattern",
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Literal::Unsigned(v) => i128::try_from(*v).ok(),
            Literal::Signed(v) => Some(*v),
            Literal::Boolean(v) => Some(*v as i128),
            Literal::Char(v) => Some(*v as i128),
            Literal::Char16(v) => Some(*v as i128),
            Literal::Float(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float(v) => Some(*v),
            Literal::Unsigned(v) => Some(*v as f64),
            Literal::Signed(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(v) => Some(*v),
            Literal::Unsigned(v) => Some(*v != 0),
            Literal::Signed(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Literal::Unsigned(_) | Literal::Signed(_) | Literal::Float(_)
        )
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Unsigned(v) => write!(f, "{v}"),
            Literal::Signed(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Boolean(v) => write!(f, "{v}"),
            Literal::Char(v) => write!(f, "{v}"),
            Literal::Char16(v) => write!(f, "{v}"),
            Literal::Str(v) => write!(f, "{v}"),
            Literal::Pattern(p) => write!(f, "{}", p.format()),
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Str(a), Literal::Str(b)) => a == b,
            (Literal::Boolean(a), Literal::Boolean(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl PartialOrd for Literal {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Literal::Str(a), Literal::Str(b)) => a.partial_cmp(b),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}
