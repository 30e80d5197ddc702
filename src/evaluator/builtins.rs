//! A small table of native (plugin-provided-in-spirit) functions. The core
//! has no FFI or plugin registry (§1 Non-goals), so these are the only
//! natives available; everything else a pattern program calls must be a
//! user-defined `fn`.

use crate::value::Literal;

use super::error::{EvalError, EvalErrorKind};
use crate::source::Span;

pub type NativeFn = fn(&[Literal], Span) -> Result<Literal, EvalError>;

pub fn lookup(name: &str) -> Option<NativeFn> {
    Some(match name {
        "abs" => abs,
        "min" => min,
        "max" => max,
        _ => return None,
    })
}

fn arity_error(name: &str, expected: &str, got: usize, span: Span) -> EvalError {
    EvalError::new(
        EvalErrorKind::ArityMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            got,
        },
        span,
    )
}

fn abs(args: &[Literal], span: Span) -> Result<Literal, EvalError> {
    let [a] = args else {
        return Err(arity_error("abs", "exactly 1", args.len(), span));
    };
    match a {
        Literal::Signed(v) => Ok(Literal::Signed(v.wrapping_abs())),
        Literal::Float(v) => Ok(Literal::Float(v.abs())),
        Literal::Unsigned(v) => Ok(Literal::Unsigned(*v)),
        other => Err(EvalError::new(
            EvalErrorKind::InvalidOperand(format!("abs() expects a number, got {}", other.type_name())),
            span,
        )),
    }
}

fn min(args: &[Literal], span: Span) -> Result<Literal, EvalError> {
    let [a, b] = args else {
        return Err(arity_error("min", "exactly 2", args.len(), span));
    };
    Ok(if a.partial_cmp(b) == Some(std::cmp::Ordering::Greater) {
        b.clone()
    } else {
        a.clone()
    })
}

fn max(args: &[Literal], span: Span) -> Result<Literal, EvalError> {
    let [a, b] = args else {
        return Err(arity_error("max", "exactly 2", args.len(), span));
    };
    Ok(if a.partial_cmp(b) == Some(std::cmp::Ordering::Less) {
        b.clone()
    } else {
        a.clone()
    })
}
