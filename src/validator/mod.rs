//! Single AST walk enforcing semantic rules the grammar cannot express
//! (§4.4): duplicate member names, unresolved type references, cyclic type
//! references, enum/bitfield range overflow, impure placement expressions.

mod error;

pub use error::{ValidateError, ValidateErrorKind};

use std::collections::{HashMap, HashSet};

use crate::lexer::ValueType;
use crate::parser::ast::{
    ArrayLen, BitfieldDecl, EnumDecl, Expr, Item, Member, NamespaceDecl, Program,
    ScopeResolutionPath, TypeRef, UdtDecl, UdtKind, VarDecl,
};

pub type ValidateResult<T> = Result<T, ValidateError>;

/// What a name in the type table refers to, enough to drive cycle-checking
/// and member-reference resolution without re-walking the AST.
#[derive(Debug, Clone)]
enum TypeEntry {
    Udt {
        kind: UdtKind,
        member_types: Vec<(String, bool)>, // (referenced type name, is_pointer)
    },
    Enum,
    Bitfield,
    Typedef {
        target: String,
    },
}

/// Walks a [`Program`] once, collecting every [`ValidateError`] it can find
/// rather than aborting at the first (the pipeline as a whole still hard
/// aborts on any validator failure — see §7 "Propagation policy").
#[derive(Default)]
pub struct Validator {
    types: HashMap<String, TypeEntry>,
    errors: Vec<ValidateError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the whole walk and returns the first error found, matching the
    /// pipeline's single-error `?` composition in [`crate::run`]. Use
    /// [`Validator::validate_all`] to retrieve every error collected.
    pub fn validate(&mut self, program: &Program) -> ValidateResult<()> {
        let errors = self.validate_all(program);
        match errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn validate_all(&mut self, program: &Program) -> Vec<ValidateError> {
        self.errors.clear();
        self.collect_types(&program.items);
        self.check_cycles();
        self.walk_items(&program.items);
        std::mem::take(&mut self.errors)
    }

    fn collect_types(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Udt(udt) => {
                    let member_types = collect_member_type_refs(udt);
                    self.types.insert(
                        udt.name.clone(),
                        TypeEntry::Udt {
                            kind: udt.kind,
                            member_types,
                        },
                    );
                }
                Item::Enum(e) => {
                    self.types.insert(e.name.clone(), TypeEntry::Enum);
                }
                Item::Bitfield(b) => {
                    self.types.insert(b.name.clone(), TypeEntry::Bitfield);
                }
                Item::Typedef(t) => {
                    self.types.insert(
                        t.name.clone(),
                        TypeEntry::Typedef {
                            target: t.target.display_name(),
                        },
                    );
                }
                Item::Namespace(ns) => self.collect_types(&ns.body),
                _ => {}
            }
        }
    }

    fn check_cycles(&mut self) {
        let names: Vec<String> = self.types.keys().cloned().collect();
        for name in names {
            let mut stack = HashSet::new();
            if self.has_cycle(&name, &mut stack) {
                self.errors.push(ValidateError::new(
                    ValidateErrorKind::CyclicType(name),
                    crate::source::Span::synthetic(),
                ));
            }
        }
    }

    fn has_cycle(&self, name: &str, stack: &mut HashSet<String>) -> bool {
        if !stack.insert(name.to_string()) {
            return true;
        }
        let cyclic = match self.types.get(name) {
            Some(TypeEntry::Udt { member_types, .. }) => member_types
                .iter()
                .filter(|(_, is_pointer)| !is_pointer)
                .any(|(ty, _)| self.types.contains_key(ty) && self.has_cycle(ty, stack)),
            Some(TypeEntry::Typedef { target }) => {
                self.types.contains_key(target) && self.has_cycle(target, stack)
            }
            _ => false,
        };
        stack.remove(name);
        cyclic
    }

    fn walk_items(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Udt(udt) => self.walk_udt(udt),
                Item::Enum(e) => self.walk_enum(e),
                Item::Bitfield(b) => self.walk_bitfield(b),
                Item::Typedef(t) => self.check_type_ref(&t.target),
                Item::Var(v) => self.walk_var_decl(v),
                Item::Function(f) => {
                    for param in &f.params {
                        self.check_type_ref(&param.ty);
                    }
                    for stmt in &f.body {
                        self.walk_stmt(stmt);
                    }
                }
                Item::Namespace(ns) => self.walk_namespace(ns),
                Item::Import(_) => {}
            }
        }
    }

    fn walk_namespace(&mut self, ns: &NamespaceDecl) {
        self.walk_items(&ns.body);
    }

    fn walk_udt(&mut self, udt: &UdtDecl) {
        for parent in &udt.inherits {
            self.check_type_ref(parent);
        }
        let mut seen = HashSet::new();
        self.check_member_names(&udt.members, &mut seen, udt.span);
        self.walk_members(&udt.members);
    }

    fn check_member_names<'a>(
        &mut self,
        members: &'a [Member],
        seen: &mut HashSet<&'a str>,
        span: crate::source::Span,
    ) {
        for member in members {
            match member {
                Member::Field(v) => {
                    if !seen.insert(v.name.as_str()) {
                        self.errors.push(ValidateError::new(
                            ValidateErrorKind::DuplicateMember(v.name.clone()),
                            v.span,
                        ));
                    }
                }
                Member::Conditional {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.check_member_names(then_branch, seen, span);
                    self.check_member_names(else_branch, seen, span);
                }
                Member::Padding { .. } => {}
            }
        }
    }

    fn walk_members(&mut self, members: &[Member]) {
        for member in members {
            match member {
                Member::Field(v) => self.walk_var_decl(v),
                Member::Conditional {
                    condition,
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.check_expr(condition);
                    self.walk_members(then_branch);
                    self.walk_members(else_branch);
                }
                Member::Padding { count, .. } => self.check_expr(count),
            }
        }
    }

    fn walk_enum(&mut self, e: &EnumDecl) {
        self.check_type_ref(&e.underlying);
        let width = match &e.underlying {
            TypeRef::Builtin(v, _) => v.byte_width(),
            TypeRef::Named(_) => None,
        };
        let mut next = 0i128;
        for entry in &e.entries {
            let value = match &entry.value {
                Some(expr) => {
                    self.check_expr(expr);
                    const_fold(expr)
                }
                None => Some(next),
            };
            if let Some(v) = value {
                next = v + 1;
                if let Some(width) = width {
                    if !fits_width(v, width, underlying_is_signed(&e.underlying)) {
                        self.errors.push(ValidateError::new(
                            ValidateErrorKind::EnumOutOfRange {
                                entry: entry.name.clone(),
                                value: v.to_string(),
                            },
                            entry.span,
                        ));
                    }
                }
            }
        }
    }

    fn walk_bitfield(&mut self, b: &BitfieldDecl) {
        let mut total_bits: i128 = 0;
        for entry in &b.entries {
            self.check_expr(&entry.size);
            match const_fold(&entry.size) {
                Some(bits) if bits > 0 && bits <= 128 => total_bits += bits,
                Some(_) => self.errors.push(ValidateError::new(
                    ValidateErrorKind::BitfieldOverflow(b.name.clone()),
                    entry.span,
                )),
                None => {}
            }
        }
        if total_bits > 128 {
            self.errors.push(ValidateError::new(
                ValidateErrorKind::BitfieldOverflow(b.name.clone()),
                b.span,
            ));
        }
    }

    fn walk_var_decl(&mut self, v: &VarDecl) {
        self.check_type_ref(&v.ty);
        if let Some(size_ty) = &v.pointer_size {
            self.check_type_ref(size_ty);
        }
        if let Some(array) = &v.array {
            match array {
                ArrayLen::Fixed(e) | ArrayLen::While(e) => self.check_expr(e),
                ArrayLen::Unbounded => {}
            }
        }
        if let Some(init) = &v.initializer {
            self.check_expr(init);
        }
        if let Some(placement) = &v.placement {
            self.check_expr(placement);
            if contains_call(placement) {
                self.errors.push(ValidateError::new(
                    ValidateErrorKind::BadPlacement(
                        "placement expression calls a function with side effects".into(),
                    ),
                    placement.span(),
                ));
            }
            if matches!(placement, Expr::Literal(crate::value::Literal::Str(_), _)) {
                self.errors.push(ValidateError::new(
                    ValidateErrorKind::BadPlacement("placement cannot be a string".into()),
                    placement.span(),
                ));
            }
        }
    }

    fn walk_stmt(&mut self, stmt: &crate::parser::ast::Stmt) {
        use crate::parser::ast::Stmt;
        match stmt {
            Stmt::VarDecl(v) => self.walk_var_decl(v),
            Stmt::Assign(a) => {
                self.check_expr(&a.target);
                self.check_expr(&a.value);
            }
            Stmt::Expr(e, _) => self.check_expr(e),
            Stmt::Return(Some(e), _) => self.check_expr(e),
            Stmt::Return(None, _) => {}
            Stmt::Break(_) | Stmt::Continue(_) => {}
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_expr(condition);
                for s in then_branch {
                    self.walk_stmt(s);
                }
                for s in else_branch {
                    self.walk_stmt(s);
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.check_expr(condition);
                for s in body {
                    self.walk_stmt(s);
                }
            }
            Stmt::Block(stmts, _) => {
                for s in stmts {
                    self.walk_stmt(s);
                }
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Unary(_, inner, _) => self.check_expr(inner),
            Expr::Math(lhs, _, rhs, _) => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            Expr::Ternary(c, t, e, _) => {
                self.check_expr(c);
                self.check_expr(t);
                self.check_expr(e);
            }
            Expr::FunctionCall(_, args, _) => {
                for a in args {
                    self.check_expr(a);
                }
            }
            Expr::SizeOf(op, _) | Expr::AddressOf(op, _) => {
                if let crate::parser::ast::Operand::Type(ty) = op {
                    self.check_type_ref(ty);
                } else if let crate::parser::ast::Operand::Expr(e) = op {
                    self.check_expr(e);
                }
            }
            Expr::RValue(path) => {
                for seg in &path.segments {
                    if let crate::parser::ast::PathSegment::Index(idx) = seg {
                        self.check_expr(idx);
                    }
                }
            }
            Expr::Literal(..) | Expr::ScopeResolution(..) => {}
        }
    }

    fn check_type_ref(&mut self, ty: &TypeRef) {
        if let TypeRef::Named(path) = ty {
            let name = path.segments.last().cloned().unwrap_or_default();
            if !self.types.contains_key(&name) && !is_known_alias(&name) {
                self.errors.push(ValidateError::new(
                    ValidateErrorKind::UnknownType(scope_path_display(path)),
                    path.span,
                ));
            }
        }
    }
}

fn scope_path_display(path: &ScopeResolutionPath) -> String {
    path.segments.join("::")
}

/// A handful of names the preprocessor/evaluator predefine that never show
/// up in the type table (`__PATHEX__` and user-defined function-style
/// attributes are resolved elsewhere); kept narrow on purpose.
fn is_known_alias(_name: &str) -> bool {
    false
}

fn collect_member_type_refs(udt: &UdtDecl) -> Vec<(String, bool)> {
    fn walk(members: &[Member], out: &mut Vec<(String, bool)>) {
        for member in members {
            match member {
                Member::Field(v) => {
                    if let TypeRef::Named(path) = &v.ty {
                        let name = path.segments.last().cloned().unwrap_or_default();
                        out.push((name, v.pointer_size.is_some()));
                    }
                }
                Member::Conditional {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    walk(then_branch, out);
                    walk(else_branch, out);
                }
                Member::Padding { .. } => {}
            }
        }
    }
    let mut out = Vec::new();
    walk(&udt.members, &mut out);
    out
}

fn contains_call(expr: &Expr) -> bool {
    match expr {
        Expr::FunctionCall(..) => true,
        Expr::Unary(_, inner, _) => contains_call(inner),
        Expr::Math(lhs, _, rhs, _) => contains_call(lhs) || contains_call(rhs),
        Expr::Ternary(c, t, e, _) => contains_call(c) || contains_call(t) || contains_call(e),
        Expr::SizeOf(crate::parser::ast::Operand::Expr(e), _)
        | Expr::AddressOf(crate::parser::ast::Operand::Expr(e), _) => contains_call(e),
        _ => false,
    }
}

/// Constant-folds the narrow subset of expressions that can legally appear
/// as an enum value or a bitfield width: literals and unary negation of a
/// literal. Anything else (identifiers, arithmetic depending on other
/// entries) is left unchecked rather than rejected.
fn const_fold(expr: &Expr) -> Option<i128> {
    match expr {
        Expr::Literal(lit, _) => lit.as_i128(),
        Expr::Unary(crate::parser::ast::UnaryOp::Neg, inner, _) => const_fold(inner).map(|v| -v),
        _ => None,
    }
}

fn underlying_is_signed(ty: &TypeRef) -> bool {
    matches!(ty, TypeRef::Builtin(v, _) if v.is_signed())
}

fn fits_width(value: i128, byte_width: u64, signed: bool) -> bool {
    let bits = byte_width * 8;
    if bits >= 128 {
        return true;
    }
    if signed {
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        value >= min && value <= max
    } else {
        value >= 0 && value < (1i128 << bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::parse;
    use crate::source::Source;

    fn validate(src: &str) -> Vec<ValidateError> {
        let source = Source::new("test", src);
        let tokens = Lexer::new(&source).lex().unwrap();
        let program = parse(tokens).unwrap();
        Validator::new().validate_all(&program)
    }

    #[test]
    fn unknown_type_is_reported() {
        let errors = validate("Unknown x @ 0;");
        assert!(matches!(
            errors[0].kind,
            ValidateErrorKind::UnknownType(ref n) if n == "Unknown"
        ));
    }

    #[test]
    fn duplicate_member_is_reported() {
        let errors = validate("struct P { u8 a; u8 a; };");
        assert!(matches!(
            errors[0].kind,
            ValidateErrorKind::DuplicateMember(ref n) if n == "a"
        ));
    }

    #[test]
    fn direct_cycle_is_reported() {
        let errors = validate("struct A { B b; }; struct B { A a; };");
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, ValidateErrorKind::CyclicType(_))));
    }

    #[test]
    fn pointer_member_breaks_cycle() {
        let errors = validate("struct A { B *b : u32; }; struct B { A a; };");
        assert!(!errors
            .iter()
            .any(|e| matches!(e.kind, ValidateErrorKind::CyclicType(_))));
    }

    #[test]
    fn enum_value_out_of_range_is_reported() {
        let errors = validate("enum E : u8 { A = 256 };");
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, ValidateErrorKind::EnumOutOfRange { .. })));
    }

    #[test]
    fn valid_program_has_no_errors() {
        let errors = validate("struct P { u16 a; u16 b; }; P p @ 0;");
        assert!(errors.is_empty());
    }
}
