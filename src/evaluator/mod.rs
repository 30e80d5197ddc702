//! Tree-walking interpreter: executes statements, evaluates expressions,
//! manages the scope stack and the placed-pattern tree, reads bytes through
//! the [`Provider`] (§4.6).

mod builtins;
mod error;
mod provider;

pub use error::{EvalError, EvalErrorKind};
pub use provider::{Provider, RegionValidity, SliceProvider};

use std::collections::HashMap;

use crate::lexer::ValueType;
use crate::parser::ast::{
    ArrayLen, Attribute, BitfieldDecl, Direction, EnumDecl, Expr, FnDecl, Item, MathOp, Member,
    NamespaceDecl, Operand, Param, PathHead, PathSegment, Program, RValuePath, Stmt, TypeRef,
    TypedefDecl, UdtDecl, UdtKind, UnaryOp, VarDecl,
};
use crate::pattern::{default_color_for, parse_rgb_hex, Endian, Pattern, PatternKind};
use crate::source::Span;
use crate::value::Literal;

pub type EvalResult<T> = Result<T, EvalError>;

/// What a statement/block does with control, richer than the `(stopped,
/// value)` pair the specification describes at the `execute` boundary
/// (§4.6 "Statement execution contract"): `Break`/`Continue` need to be
/// told apart inside loops, so they get their own variants here and
/// collapse to `(true, None)` only once they reach a loop or fall off the
/// end of a function body.
#[derive(Debug, Clone)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Option<Literal>),
}

impl Flow {
    fn is_stopped(&self) -> bool {
        !matches!(self, Flow::Normal)
    }
}

/// Tree-walking interpreter state (§4.6 "Evaluator").
pub struct Evaluator<'p> {
    provider: &'p mut dyn Provider,
    data_offset: u64,
    default_endian: Endian,
    scopes: Vec<Vec<Pattern>>,
    udts: HashMap<String, UdtDecl>,
    enums: HashMap<String, EnumDecl>,
    bitfields: HashMap<String, BitfieldDecl>,
    typedefs: HashMap<String, TypedefDecl>,
    functions: HashMap<String, FnDecl>,
    globals: HashMap<String, Literal>,
    call_depth: usize,
    max_call_depth: usize,
    pattern_count: usize,
    max_pattern_count: usize,
    loop_budget: u64,
    cancel: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,
    local_cursor: u64,
    /// Whether the most recent `read_bytes` call ran past the provider's
    /// end and was zero-filled; consumed by callers right after the read
    /// to stamp `Pattern::truncated` (SPEC_FULL §C).
    last_read_truncated: bool,
}

impl<'p> Evaluator<'p> {
    pub fn new(provider: &'p mut dyn Provider) -> Self {
        Self::with_limits(provider, 256, 1_000_000)
    }

    pub fn with_limits(
        provider: &'p mut dyn Provider,
        max_call_depth: usize,
        max_pattern_count: usize,
    ) -> Self {
        let mut globals = HashMap::new();
        globals.insert("__PATHEX__".to_string(), Literal::Unsigned(1));

        Self {
            provider,
            data_offset: 0,
            default_endian: Endian::Little,
            scopes: vec![Vec::new()],
            udts: HashMap::new(),
            enums: HashMap::new(),
            bitfields: HashMap::new(),
            typedefs: HashMap::new(),
            functions: HashMap::new(),
            globals,
            call_depth: 0,
            max_call_depth,
            pattern_count: 0,
            max_pattern_count,
            loop_budget: 2_000_000,
            cancel: None,
            local_cursor: 0,
            last_read_truncated: false,
        }
    }

    /// Wires up a shared cancel flag (§5 "Suspension points"); the
    /// evaluator consults it at every statement boundary and loop
    /// iteration and aborts promptly with `Cancelled`.
    pub fn with_cancel_flag(mut self, flag: std::sync::Arc<std::sync::atomic::AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn set_default_endian(&mut self, endian: Endian) {
        self.default_endian = endian;
    }

    pub fn evaluate(&mut self, program: &Program) -> EvalResult<Vec<Pattern>> {
        self.register_items(&program.items);

        let mut out = Vec::new();
        self.run_items(&program.items, &mut out)?;
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Registration: gather UDTs/enums/bitfields/typedefs/functions before
    // evaluating any statement, so forward references across the program
    // resolve regardless of declaration order.
    // -----------------------------------------------------------------

    fn register_items(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Udt(u) => {
                    self.udts.insert(u.name.clone(), u.clone());
                }
                Item::Enum(e) => {
                    self.enums.insert(e.name.clone(), e.clone());
                }
                Item::Bitfield(b) => {
                    self.bitfields.insert(b.name.clone(), b.clone());
                }
                Item::Typedef(t) => {
                    self.typedefs.insert(t.name.clone(), t.clone());
                }
                Item::Function(f) => {
                    self.functions.insert(f.name.clone(), f.clone());
                }
                Item::Namespace(ns) => self.register_items(&ns.body),
                Item::Var(_) | Item::Import(_) => {}
            }
        }
    }

    fn run_items(&mut self, items: &[Item], out: &mut Vec<Pattern>) -> EvalResult<()> {
        for item in items {
            self.check_cancel(Span::synthetic())?;
            match item {
                Item::Var(v) => {
                    let pattern = self.create_var_pattern(v)?;
                    out.push(pattern);
                }
                Item::Namespace(ns) => self.run_namespace(ns, out)?,
                Item::Udt(_)
                | Item::Enum(_)
                | Item::Bitfield(_)
                | Item::Typedef(_)
                | Item::Function(_)
                | Item::Import(_) => {}
            }
        }
        Ok(())
    }

    fn run_namespace(&mut self, ns: &NamespaceDecl, out: &mut Vec<Pattern>) -> EvalResult<()> {
        self.run_items(&ns.body, out)
    }

    // -----------------------------------------------------------------
    // Cancellation / limits
    // -----------------------------------------------------------------

    fn check_cancel(&self, span: Span) -> EvalResult<()> {
        if let Some(flag) = &self.cancel {
            if flag.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(EvalError::new(EvalErrorKind::Cancelled, span));
            }
        }
        Ok(())
    }

    fn bump_pattern_count(&mut self, span: Span) -> EvalResult<()> {
        self.pattern_count += 1;
        if self.pattern_count > self.max_pattern_count {
            return Err(EvalError::new(EvalErrorKind::PatternLimit, span));
        }
        Ok(())
    }

    fn consume_loop_budget(&mut self, span: Span) -> EvalResult<()> {
        if self.loop_budget == 0 {
            return Err(EvalError::new(EvalErrorKind::PatternLimit, span));
        }
        self.loop_budget -= 1;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Scope stack
    // -----------------------------------------------------------------

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) -> Vec<Pattern> {
        self.scopes.pop().unwrap_or_default()
    }

    fn current_scope_mut(&mut self) -> &mut Vec<Pattern> {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn find_pattern(&self, name: &str) -> Option<&Pattern> {
        for scope in self.scopes.iter().rev() {
            if let Some(p) = scope.iter().rev().find(|p| p.variable_name == name) {
                return Some(p);
            }
        }
        None
    }

    fn find_pattern_in_parent(&self, name: &str) -> Option<&Pattern> {
        if self.scopes.len() < 2 {
            return None;
        }
        for scope in self.scopes[..self.scopes.len() - 1].iter().rev() {
            if let Some(p) = scope.iter().rev().find(|p| p.variable_name == name) {
                return Some(p);
            }
        }
        None
    }

    fn find_pattern_mut(&mut self, name: &str) -> Option<&mut Pattern> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(p) = scope.iter_mut().rev().find(|p| p.variable_name == name) {
                return Some(p);
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Pattern creation (§4.6 "Pattern creation contract")
    // -----------------------------------------------------------------

    fn create_var_pattern(&mut self, decl: &VarDecl) -> EvalResult<Pattern> {
        self.check_cancel(decl.span)?;

        // A declaration with an initializer and no placement and no
        // pointer marker is a `local` scratch variable: a computed value
        // that never touches the provider (§3 "local patterns live on the
        // evaluator stack").
        if decl.placement.is_none() && decl.pointer_size.is_none() && decl.initializer.is_some() {
            let value = self.eval_expr(decl.initializer.as_ref().unwrap())?;
            let mut pattern = self.literal_to_pattern(&value, &decl.ty)?;
            pattern.local = true;
            pattern.offset = self.local_cursor;
            self.local_cursor += pattern.size.max(1);
            pattern.variable_name = decl.name.clone();
            self.apply_attributes(&mut pattern, &decl.attributes)?;
            self.bump_pattern_count(decl.span)?;
            return Ok(pattern);
        }

        let saved_offset = self.data_offset;
        if let Some(placement) = &decl.placement {
            let value = self.eval_expr(placement)?;
            if matches!(value, Literal::Str(_)) {
                return Err(EvalError::new(
                    EvalErrorKind::InvalidPlacement("placement cannot evaluate to a string".into()),
                    placement.span(),
                ));
            }
            let addr = value.as_u64().ok_or_else(|| {
                EvalError::new(
                    EvalErrorKind::InvalidPlacement("placement must evaluate to an integer".into()),
                    placement.span(),
                )
            })?;
            self.data_offset = addr;
        }

        let mut pattern = if let Some(size_ty) = &decl.pointer_size {
            self.create_pointer_pattern(&decl.ty, size_ty, decl.span)?
        } else if let Some(array) = &decl.array {
            self.create_array_pattern(&decl.ty, array, &decl.attributes, decl.span)?
        } else {
            self.instantiate_type(&decl.ty)?
        };

        pattern.variable_name = decl.name.clone();
        if let Some(Direction::Out) = decl.direction {
            pattern.hidden = false;
        }
        self.apply_attributes(&mut pattern, &decl.attributes)?;
        self.bump_pattern_count(decl.span)?;

        if decl.placement.is_some() {
            self.data_offset = saved_offset.max(self.data_offset);
            self.data_offset = self.data_offset.max(pattern.offset + pattern.size);
        }

        Ok(pattern)
    }

    fn literal_to_pattern(&self, value: &Literal, ty: &TypeRef) -> EvalResult<Pattern> {
        let type_name = ty.display_name();
        let kind = match value {
            Literal::Unsigned(v) => PatternKind::Unsigned(*v),
            Literal::Signed(v) => PatternKind::Signed(*v),
            Literal::Float(v) => PatternKind::Float(*v),
            Literal::Boolean(v) => PatternKind::Boolean(*v),
            Literal::Char(v) => PatternKind::Character(*v),
            Literal::Char16(v) => PatternKind::Character16(*v),
            Literal::Str(v) => PatternKind::String(v.clone()),
            Literal::Pattern(p) => return Ok((**p).clone()),
        };
        let size = builtin_width(ty).unwrap_or(0);
        Ok(Pattern::new(kind, type_name, self.default_endian).with_span(0, size))
    }

    /// Builds the pattern for a `T *name : SIZE_TYPE` declaration (§4.3
    /// "Pointers", §4.6 "Pointer semantics").
    fn create_pointer_pattern(
        &mut self,
        pointee_ty: &TypeRef,
        size_ty: &TypeRef,
        span: Span,
    ) -> EvalResult<Pattern> {
        let width = self.type_width(size_ty, span)?;
        let storage_offset = self.data_offset;
        let bytes = self.read_bytes(storage_offset, width, span)?;
        let pointer_truncated = self.last_read_truncated;
        let addr = bytes_to_u128(&bytes, self.default_endian) as u64;
        self.data_offset = storage_offset + width;
        let after_pointer = self.data_offset;

        self.data_offset = addr;
        let pointee = self.instantiate_type(pointee_ty)?;
        self.data_offset = after_pointer;

        let type_name = format!("{}*", pointee_ty.display_name());
        let mut pattern = Pattern::new(
            PatternKind::Pointer {
                pointee: Box::new(pointee),
                pointed_at_address: addr,
                pointer_base: self.provider.base_address(),
            },
            type_name,
            self.default_endian,
        );
        pattern.offset = storage_offset;
        pattern.size = width;
        pattern.truncated = pointer_truncated;
        Ok(pattern)
    }

    /// Handles `T name[n]`, `T name[while(cond)]`, `T name[]` (§4.6 "Array
    /// semantics").
    fn create_array_pattern(
        &mut self,
        element_ty: &TypeRef,
        array: &ArrayLen,
        attrs: &[Attribute],
        span: Span,
    ) -> EvalResult<Pattern> {
        let start = self.data_offset;
        let is_static = attrs.iter().any(|a| a.name == "static");

        match array {
            ArrayLen::Fixed(len_expr) => {
                let count = self
                    .eval_expr(len_expr)?
                    .as_u64()
                    .ok_or_else(|| bad_array(span, "array length must be an integer"))?;

                if is_static {
                    if count == 0 {
                        let pat = Pattern::new(
                            PatternKind::DynamicArray { entries: Vec::new() },
                            format!("{}[]", element_ty.display_name()),
                            self.default_endian,
                        )
                        .with_span(start, 0);
                        return Ok(pat);
                    }
                    let template = self.instantiate_type(element_ty)?;
                    let elem_size = template.size.max(1);
                    self.data_offset = start + elem_size * count;
                    let type_name = format!("{}[{count}]", element_ty.display_name());
                    let mut pattern = Pattern::new(
                        PatternKind::StaticArray {
                            template: Box::new(template),
                            entry_count: count,
                        },
                        type_name,
                        self.default_endian,
                    );
                    pattern.offset = start;
                    pattern.size = elem_size * count;
                    Ok(pattern)
                } else {
                    let mut entries = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        self.check_cancel(span)?;
                        entries.push(self.instantiate_type(element_ty)?);
                    }
                    let type_name = format!("{}[{count}]", element_ty.display_name());
                    let size = self.data_offset - start;
                    let mut pattern = Pattern::new(
                        PatternKind::DynamicArray { entries },
                        type_name,
                        self.default_endian,
                    );
                    pattern.offset = start;
                    pattern.size = size;
                    Ok(pattern)
                }
            }
            ArrayLen::While(cond) => {
                let mut entries = Vec::new();
                loop {
                    self.check_cancel(span)?;
                    self.consume_loop_budget(span)?;
                    if self.data_offset >= self.provider.size() {
                        break;
                    }
                    if !self.eval_expr(cond)?.as_bool().unwrap_or(false) {
                        break;
                    }
                    entries.push(self.instantiate_type(element_ty)?);
                }
                let type_name = format!("{}[]", element_ty.display_name());
                let size = self.data_offset - start;
                let mut pattern = Pattern::new(
                    PatternKind::DynamicArray { entries },
                    type_name,
                    self.default_endian,
                );
                pattern.offset = start;
                pattern.size = size;
                Ok(pattern)
            }
            ArrayLen::Unbounded => {
                let is_primitive = matches!(element_ty, TypeRef::Builtin(_, _));
                if !is_primitive {
                    return Err(bad_array(
                        span,
                        "unbounded arrays of non-primitive types need an explicit while(...) size",
                    ));
                }
                let mut entries = Vec::new();
                loop {
                    self.check_cancel(span)?;
                    self.consume_loop_budget(span)?;
                    if self.data_offset >= self.provider.size() {
                        break;
                    }
                    let entry = self.instantiate_type(element_ty)?;
                    let is_zero = matches!(
                        &entry.kind,
                        PatternKind::Unsigned(0) | PatternKind::Signed(0) | PatternKind::Character('\0')
                    );
                    entries.push(entry);
                    if is_zero {
                        break;
                    }
                }
                let type_name = format!("{}[]", element_ty.display_name());
                let size = self.data_offset - start;
                let mut pattern = Pattern::new(
                    PatternKind::DynamicArray { entries },
                    type_name,
                    self.default_endian,
                );
                pattern.offset = start;
                pattern.size = size;
                Ok(pattern)
            }
        }
    }

    /// Instantiates one value of `ty` at the current `data_offset`,
    /// advancing it by exactly the number of bytes consumed.
    fn instantiate_type(&mut self, ty: &TypeRef) -> EvalResult<Pattern> {
        self.check_cancel(Span::synthetic())?;
        match ty {
            TypeRef::Builtin(v, span) => self.instantiate_builtin(*v, *span),
            TypeRef::Named(path) => {
                let name = path.segments.last().cloned().unwrap_or_default();
                if let Some(typedef) = self.typedefs.get(&name).cloned() {
                    let mut pattern = self.instantiate_type(&typedef.target)?;
                    pattern.type_name = name;
                    return Ok(pattern);
                }
                if let Some(udt) = self.udts.get(&name).cloned() {
                    return match udt.kind {
                        UdtKind::Struct => self.instantiate_struct(&udt),
                        UdtKind::Union => self.instantiate_union(&udt),
                    };
                }
                if let Some(e) = self.enums.get(&name).cloned() {
                    return self.instantiate_enum(&e, path.span);
                }
                if let Some(b) = self.bitfields.get(&name).cloned() {
                    return self.instantiate_bitfield(&b, path.span);
                }
                Err(EvalError::new(
                    EvalErrorKind::TypeMismatch(format!("unknown type '{name}'")),
                    path.span,
                ))
            }
        }
    }

    fn instantiate_builtin(&mut self, v: ValueType, span: Span) -> EvalResult<Pattern> {
        let start = self.data_offset;
        let type_name = format!("{v:?}").to_lowercase();

        self.last_read_truncated = false;
        let mut pattern = match v {
            ValueType::Padding => {
                self.data_offset += 1;
                Pattern::new(PatternKind::Padding, type_name, self.default_endian).with_span(start, 1)
            }
            ValueType::Bool => {
                let bytes = self.read_bytes(start, 1, span)?;
                self.data_offset += 1;
                Pattern::new(PatternKind::Boolean(bytes[0] != 0), type_name, self.default_endian)
                    .with_span(start, 1)
            }
            ValueType::Char => {
                let bytes = self.read_bytes(start, 1, span)?;
                self.data_offset += 1;
                Pattern::new(
                    PatternKind::Character(bytes[0] as char),
                    type_name,
                    self.default_endian,
                )
                .with_span(start, 1)
            }
            ValueType::Char16 => {
                let bytes = self.read_bytes(start, 2, span)?;
                self.data_offset += 2;
                let value = bytes_to_u128(&bytes, self.default_endian) as u16;
                Pattern::new(PatternKind::Character16(value), type_name, self.default_endian)
                    .with_span(start, 2)
            }
            ValueType::Float | ValueType::Double => {
                let width = v.byte_width().unwrap();
                let bytes = self.read_bytes(start, width, span)?;
                self.data_offset += width;
                let value = if width == 4 {
                    let raw = bytes_to_u128(&bytes, self.default_endian) as u32;
                    f32::from_bits(raw) as f64
                } else {
                    let raw = bytes_to_u128(&bytes, self.default_endian) as u64;
                    f64::from_bits(raw)
                };
                Pattern::new(PatternKind::Float(value), type_name, self.default_endian)
                    .with_span(start, width)
            }
            ValueType::Str | ValueType::Auto => {
                let mut text = Vec::new();
                let mut truncated = false;
                loop {
                    if self.data_offset >= self.provider.size() {
                        truncated = true;
                        break;
                    }
                    let (byte, _) = self.read_bytes_raw(self.data_offset, 1);
                    if byte[0] == 0 {
                        self.data_offset += 1;
                        break;
                    }
                    text.push(byte[0]);
                    self.data_offset += 1;
                }
                self.last_read_truncated = truncated;
                let size = self.data_offset - start;
                Pattern::new(
                    PatternKind::String(String::from_utf8_lossy(&text).into_owned()),
                    type_name,
                    self.default_endian,
                )
                .with_span(start, size)
            }
            signed_or_unsigned => {
                let width = signed_or_unsigned.byte_width().unwrap();
                let bytes = self.read_bytes(start, width, span)?;
                self.data_offset += width;
                let raw = bytes_to_u128(&bytes, self.default_endian);
                if signed_or_unsigned.is_signed() {
                    let value = sign_extend(raw, width);
                    Pattern::new(PatternKind::Signed(value), type_name, self.default_endian)
                        .with_span(start, width)
                } else {
                    Pattern::new(PatternKind::Unsigned(raw), type_name, self.default_endian)
                        .with_span(start, width)
                }
            }
        };
        pattern.truncated = self.last_read_truncated;
        Ok(pattern)
    }

    fn instantiate_struct(&mut self, udt: &UdtDecl) -> EvalResult<Pattern> {
        let start = self.data_offset;
        self.push_scope();
        let result = self.instantiate_members(&udt.members);
        let members = self.pop_scope();
        let members = match result {
            Ok(()) => members,
            Err(e) => return Err(e),
        };
        let size = self.data_offset - start;
        let mut pattern = Pattern::new(
            PatternKind::struct_of(members),
            udt.name.clone(),
            self.default_endian,
        );
        pattern.offset = start;
        pattern.size = size;
        Ok(pattern)
    }

    fn instantiate_union(&mut self, udt: &UdtDecl) -> EvalResult<Pattern> {
        let start = self.data_offset;
        self.push_scope();
        let mut max_size = 0u64;
        let result = (|| -> EvalResult<()> {
            for member in &udt.members {
                self.data_offset = start;
                self.instantiate_member(member)?;
                max_size = max_size.max(self.data_offset - start);
            }
            Ok(())
        })();
        let members = self.pop_scope();
        result?;
        self.data_offset = start + max_size;
        let mut pattern = Pattern::new(
            PatternKind::Union { members },
            udt.name.clone(),
            self.default_endian,
        );
        pattern.offset = start;
        pattern.size = max_size;
        Ok(pattern)
    }

    fn instantiate_members(&mut self, members: &[Member]) -> EvalResult<()> {
        for member in members {
            self.instantiate_member(member)?;
        }
        Ok(())
    }

    fn instantiate_member(&mut self, member: &Member) -> EvalResult<()> {
        self.check_cancel(Span::synthetic())?;
        match member {
            Member::Field(v) => {
                let pattern = self.create_var_pattern(v)?;
                self.current_scope_mut().push(pattern);
                Ok(())
            }
            Member::Conditional {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval_expr(condition)?.as_bool().unwrap_or(false) {
                    self.instantiate_members(then_branch)
                } else {
                    self.instantiate_members(else_branch)
                }
            }
            Member::Padding { count, span } => {
                let n = self
                    .eval_expr(count)?
                    .as_u64()
                    .ok_or_else(|| bad_array(*span, "padding size must be an integer"))?;
                let start = self.data_offset;
                self.data_offset += n;
                let pattern = Pattern::new(PatternKind::Padding, "padding", self.default_endian)
                    .with_span(start, n);
                self.current_scope_mut().push(pattern);
                Ok(())
            }
        }
    }

    fn instantiate_enum(&mut self, decl: &EnumDecl, span: Span) -> EvalResult<Pattern> {
        let start = self.data_offset;
        let width = self.type_width(&decl.underlying, span)?;
        let bytes = self.read_bytes(start, width, span)?;
        let enum_truncated = self.last_read_truncated;
        self.data_offset += width;
        let raw = bytes_to_u128(&bytes, self.default_endian);
        let signed = matches!(&decl.underlying, TypeRef::Builtin(v, _) if v.is_signed());
        let value = if signed { sign_extend(raw, width) } else { raw as i128 };

        let mut entries = Vec::new();
        let mut next = 0i128;
        for entry in &decl.entries {
            let v = match &entry.value {
                Some(e) => self.eval_expr(e)?.as_i128().unwrap_or(next),
                None => next,
            };
            next = v + 1;
            let lit = if signed {
                Literal::Signed(v)
            } else {
                Literal::Unsigned(v as u128)
            };
            entries.push((lit, entry.name.clone()));
        }

        let mut pattern = Pattern::new(
            PatternKind::Enum {
                underlying_size: width,
                entries,
                value,
            },
            decl.name.clone(),
            self.default_endian,
        );
        pattern.offset = start;
        pattern.size = width;
        pattern.truncated = enum_truncated;
        Ok(pattern)
    }

    fn instantiate_bitfield(&mut self, decl: &BitfieldDecl, span: Span) -> EvalResult<Pattern> {
        let start = self.data_offset;

        let mut sizes = Vec::with_capacity(decl.entries.len());
        let mut total_bits: u64 = 0;
        for entry in &decl.entries {
            let bits = self
                .eval_expr(&entry.size)?
                .as_u64()
                .ok_or_else(|| bad_array(entry.span, "bitfield entry size must be an integer"))?;
            sizes.push(bits);
            total_bits += bits;
        }

        let byte_size = total_bits.div_ceil(8).max(1);
        let bytes = self.read_bytes(start, byte_size, span)?;
        let bitfield_truncated = self.last_read_truncated;
        let container = bytes_to_u128(&bytes, Endian::Big); // MSB-first packing (§4.3 "Bitfields")
        self.data_offset = start + byte_size;

        let mut fields = Vec::with_capacity(decl.entries.len());
        let mut bit_cursor = 0u64;
        for (entry, bits) in decl.entries.iter().zip(sizes) {
            let shift = total_bits - bit_cursor - bits;
            let mask = if bits >= 128 { u128::MAX } else { (1u128 << bits) - 1 };
            let value = (container >> shift) & mask;
            let mut field = Pattern::new(
                PatternKind::BitfieldField {
                    bit_offset: bit_cursor,
                    bit_size: bits,
                    value,
                    owning_bitfield: decl.name.clone(),
                },
                "bitfield_entry",
                self.default_endian,
            );
            field.variable_name = entry.name.clone();
            field.offset = start;
            field.size = byte_size;
            fields.push(field);
            bit_cursor += bits;
        }

        let mut pattern = Pattern::new(PatternKind::Bitfield { fields }, decl.name.clone(), self.default_endian);
        pattern.offset = start;
        pattern.size = byte_size;
        pattern.truncated = bitfield_truncated;
        Ok(pattern)
    }

    // -----------------------------------------------------------------
    // Attributes (§4.6 "Attribute effects")
    // -----------------------------------------------------------------

    fn apply_attributes(&mut self, pattern: &mut Pattern, attrs: &[Attribute]) -> EvalResult<()> {
        for attr in attrs {
            match attr.name.as_str() {
                "color" => {
                    if let Some(value) = &attr.value {
                        if let Some(rgba) = parse_rgb_hex(value) {
                            pattern.color = rgba;
                            pattern.manual_color = true;
                        }
                    }
                }
                "name" => {
                    if let Some(value) = &attr.value {
                        pattern.display_name = Some(value.clone());
                    }
                }
                "comment" => {
                    if let Some(value) = &attr.value {
                        pattern.comment = Some(value.clone());
                    }
                }
                "hidden" => pattern.hidden = true,
                "inline" => { /* UI-only hint; nothing to materialize on the pattern itself */ }
                "format" => {
                    if let Some(value) = &attr.value {
                        pattern.formatter_fn = Some(value.clone());
                    }
                }
                "transform" => {
                    if let Some(value) = &attr.value {
                        pattern.transform_fn = Some(value.clone());
                    }
                }
                "static" => { /* consumed by create_array_pattern's fast path */ }
                _ => { /* user-defined attribute function; no native effect */ }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    fn read_bytes(&mut self, address: u64, length: u64, span: Span) -> EvalResult<Vec<u8>> {
        if length > 16 {
            return Err(EvalError::new(
                EvalErrorKind::ProviderUnreadable("read wider than 128 bits requested".into()),
                span,
            ));
        }
        let (bytes, truncated) = self.read_bytes_raw(address, length);
        self.last_read_truncated = truncated;
        Ok(bytes)
    }

    fn read_bytes_raw(&mut self, address: u64, length: u64) -> (Vec<u8>, bool) {
        self.provider.read(address, length)
    }

    fn type_width(&mut self, ty: &TypeRef, span: Span) -> EvalResult<u64> {
        match ty {
            TypeRef::Builtin(v, _) => v.byte_width().ok_or_else(|| {
                EvalError::new(
                    EvalErrorKind::TypeMismatch(format!("{v:?} has no fixed width")),
                    span,
                )
            }),
            TypeRef::Named(_) => {
                let saved = self.data_offset;
                let pattern = self.instantiate_type(ty)?;
                self.data_offset = saved;
                Ok(pattern.size)
            }
        }
    }

    // -----------------------------------------------------------------
    // Expressions (§4.6 "RValue resolution", "Numeric semantics")
    // -----------------------------------------------------------------

    pub fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Literal> {
        self.check_cancel(expr.span())?;
        match expr {
            Expr::Literal(lit, _) => Ok(lit.clone()),
            Expr::RValue(path) => self.eval_rvalue(path),
            Expr::ScopeResolution(path) => self.eval_scope_resolution(path),
            Expr::Unary(op, inner, span) => self.eval_unary(*op, inner, *span),
            Expr::Math(lhs, op, rhs, span) => self.eval_math(lhs, *op, rhs, *span),
            Expr::Ternary(c, t, e, _) => {
                if self.eval_expr(c)?.as_bool().unwrap_or(false) {
                    self.eval_expr(t)
                } else {
                    self.eval_expr(e)
                }
            }
            Expr::FunctionCall(name, args, span) => self.eval_call(name, args, *span),
            Expr::SizeOf(operand, span) => self.eval_sizeof(operand, *span),
            Expr::AddressOf(operand, span) => self.eval_addressof(operand, *span),
        }
    }

    fn eval_rvalue(&mut self, path: &RValuePath) -> EvalResult<Literal> {
        if matches!(path.head, PathHead::CurrentOffset) && path.segments.is_empty() {
            return Ok(Literal::Unsigned(self.data_offset as u128));
        }

        let pattern = self.resolve_path(path)?;
        Ok(self.pattern_to_literal(&pattern))
    }

    /// Walks an identifier chain component-by-component against the scope
    /// stack (§4.6 "RValue resolution").
    fn resolve_path(&mut self, path: &RValuePath) -> EvalResult<Pattern> {
        let mut current = match &path.head {
            PathHead::CurrentOffset => {
                let mut synthetic = Pattern::new(
                    PatternKind::Unsigned(self.data_offset as u128),
                    "u64",
                    self.default_endian,
                );
                synthetic.offset = self.data_offset;
                synthetic
            }
            PathHead::This => self
                .find_pattern_self_or_error(path.span)?
                .clone(),
            PathHead::Parent => self
                .find_pattern_in_parent(path_head_hint(path))
                .cloned()
                .or_else(|| self.scopes.iter().rev().nth(1).and_then(|s| s.last()).cloned())
                .ok_or_else(|| {
                    EvalError::new(EvalErrorKind::NoSuchVariable("parent".into()), path.span)
                })?,
            PathHead::Ident(name) => {
                if let Some(p) = self.find_pattern(name) {
                    p.clone()
                } else if let Some(lit) = self.globals.get(name).cloned() {
                    self.literal_to_pattern(&lit, &TypeRef::Builtin(ValueType::U64, path.span))?
                } else {
                    return Err(EvalError::new(
                        EvalErrorKind::NoSuchVariable(name.clone()),
                        path.span,
                    ));
                }
            }
        };

        for segment in &path.segments {
            current = self.resolve_segment(current, segment, path.span)?;
        }
        Ok(current)
    }

    fn find_pattern_self_or_error(&self, span: Span) -> EvalResult<&Pattern> {
        self.scopes
            .last()
            .and_then(|s| s.last())
            .ok_or_else(|| EvalError::new(EvalErrorKind::NoSuchVariable("this".into()), span))
    }

    fn resolve_segment(&mut self, current: Pattern, segment: &PathSegment, span: Span) -> EvalResult<Pattern> {
        let current = self.auto_deref(current);
        match segment {
            PathSegment::Member(name) => match &current.kind {
                PatternKind::Struct { members, .. } | PatternKind::Union { members } => members
                    .iter()
                    .find(|m| &m.variable_name == name)
                    .cloned()
                    .ok_or_else(|| {
                        EvalError::new(EvalErrorKind::NoSuchVariable(name.clone()), span)
                    }),
                PatternKind::Bitfield { fields } => fields
                    .iter()
                    .find(|f| &f.variable_name == name)
                    .cloned()
                    .ok_or_else(|| {
                        EvalError::new(EvalErrorKind::NoSuchVariable(name.clone()), span)
                    }),
                _ => Err(EvalError::new(
                    EvalErrorKind::TypeMismatch(format!("'{}' has no member '{name}'", current.type_name)),
                    span,
                )),
            },
            PathSegment::Index(idx_expr) => {
                let index = self
                    .eval_expr(idx_expr)?
                    .as_i128()
                    .ok_or_else(|| EvalError::new(EvalErrorKind::TypeMismatch("index must be an integer".into()), span))?;
                match &current.kind {
                    PatternKind::StaticArray { template, entry_count } => {
                        if index < 0 || index as u64 >= *entry_count {
                            return Err(EvalError::new(
                                EvalErrorKind::IndexOutOfBounds { index, len: *entry_count },
                                span,
                            ));
                        }
                        let mut entry = (**template).clone();
                        entry.offset = current.offset + (index as u64) * template.size.max(1);
                        Ok(entry)
                    }
                    PatternKind::DynamicArray { entries } => {
                        if index < 0 || index as usize >= entries.len() {
                            return Err(EvalError::new(
                                EvalErrorKind::IndexOutOfBounds { index, len: entries.len() as u64 },
                                span,
                            ));
                        }
                        Ok(entries[index as usize].clone())
                    }
                    _ => Err(EvalError::new(
                        EvalErrorKind::TypeMismatch(format!("'{}' is not indexable", current.type_name)),
                        span,
                    )),
                }
            }
        }
    }

    fn auto_deref(&self, pattern: Pattern) -> Pattern {
        match pattern.kind {
            PatternKind::Pointer { pointee, .. } => self.auto_deref(*pointee),
            _ => pattern,
        }
    }

    fn eval_scope_resolution(&mut self, path: &crate::parser::ast::ScopeResolutionPath) -> EvalResult<Literal> {
        if let [type_name, entry_name] = path.segments.as_slice() {
            if let Some(e) = self.enums.get(type_name).cloned() {
                let mut next = 0i128;
                for entry in &e.entries {
                    let v = match &entry.value {
                        Some(expr) => self.eval_expr(expr)?.as_i128().unwrap_or(next),
                        None => next,
                    };
                    next = v + 1;
                    if &entry.name == entry_name {
                        let signed = matches!(&e.underlying, TypeRef::Builtin(vt, _) if vt.is_signed());
                        return Ok(if signed { Literal::Signed(v) } else { Literal::Unsigned(v as u128) });
                    }
                }
            }
        }
        Err(EvalError::new(
            EvalErrorKind::NoSuchVariable(path.segments.join("::")),
            path.span,
        ))
    }

    fn pattern_to_literal(&self, pattern: &Pattern) -> Literal {
        match &pattern.kind {
            PatternKind::Unsigned(v) => Literal::Unsigned(*v),
            PatternKind::Signed(v) => Literal::Signed(*v),
            PatternKind::Float(v) => Literal::Float(*v),
            PatternKind::Boolean(v) => Literal::Boolean(*v),
            PatternKind::Character(c) => Literal::Char(*c),
            PatternKind::Character16(c) => Literal::Char16(*c),
            PatternKind::String(s) | PatternKind::String16(s) => Literal::Str(s.clone()),
            PatternKind::Enum { value, .. } => Literal::Signed(*value),
            PatternKind::BitfieldField { value, .. } => Literal::Unsigned(*value),
            PatternKind::Pointer { pointed_at_address, .. } => {
                Literal::Unsigned(*pointed_at_address as u128)
            }
            _ => Literal::Pattern(std::sync::Arc::new(pattern.clone())),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, inner: &Expr, span: Span) -> EvalResult<Literal> {
        let v = self.eval_expr(inner)?;
        match op {
            UnaryOp::Plus => Ok(v),
            UnaryOp::Neg => match v {
                Literal::Unsigned(u) => Ok(Literal::Signed((u as i128).wrapping_neg())),
                Literal::Signed(s) => Ok(Literal::Signed(s.wrapping_neg())),
                Literal::Float(f) => Ok(Literal::Float(-f)),
                other => Err(invalid_operand(span, format!("cannot negate {}", other.type_name()))),
            },
            UnaryOp::Not => Ok(Literal::Boolean(!v.as_bool().unwrap_or(false))),
            UnaryOp::BitNot => match v {
                Literal::Unsigned(u) => Ok(Literal::Unsigned(!u)),
                Literal::Signed(s) => Ok(Literal::Signed(!s)),
                Literal::Float(_) => Err(EvalError::new(EvalErrorKind::InvalidFloatOp("~".into()), span)),
                other => Err(invalid_operand(span, format!("cannot apply '~' to {}", other.type_name()))),
            },
        }
    }

    fn eval_math(&mut self, lhs: &Expr, op: MathOp, rhs: &Expr, span: Span) -> EvalResult<Literal> {
        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;

        if let (Literal::Str(a), Literal::Str(b)) = (&l, &r) {
            return match op {
                MathOp::Add => Ok(Literal::Str(format!("{a}{b}"))),
                MathOp::Eq => Ok(Literal::Boolean(a == b)),
                MathOp::Ne => Ok(Literal::Boolean(a != b)),
                _ => Err(invalid_operand(span, "strings only support '+', '==' and '!='".into())),
            };
        }
        if let (Literal::Str(s), n) = (&l, &r) {
            if op == MathOp::Mul {
                let n = n.as_i128().unwrap_or(0).max(0) as usize;
                return Ok(Literal::Str(s.repeat(n)));
            }
        }
        if let (n, Literal::Str(s)) = (&l, &r) {
            if op == MathOp::Mul {
                let n = n.as_i128().unwrap_or(0).max(0) as usize;
                return Ok(Literal::Str(s.repeat(n)));
            }
        }
        if matches!(l, Literal::Str(_)) || matches!(r, Literal::Str(_)) {
            return Err(invalid_operand(span, "cannot mix string with non-string in arithmetic".into()));
        }

        if matches!(op, MathOp::BitAnd | MathOp::BitOr | MathOp::BitXor | MathOp::Shl | MathOp::Shr | MathOp::Mod)
            && (matches!(l, Literal::Float(_)) || matches!(r, Literal::Float(_)))
        {
            return Err(EvalError::new(EvalErrorKind::InvalidFloatOp(format!("{op:?}")), span));
        }

        match op {
            MathOp::LogAnd => return Ok(Literal::Boolean(l.as_bool().unwrap_or(false) && r.as_bool().unwrap_or(false))),
            MathOp::LogOr => return Ok(Literal::Boolean(l.as_bool().unwrap_or(false) || r.as_bool().unwrap_or(false))),
            MathOp::LogXor => return Ok(Literal::Boolean(l.as_bool().unwrap_or(false) ^ r.as_bool().unwrap_or(false))),
            _ => {}
        }

        if matches!(op, MathOp::Eq | MathOp::Ne | MathOp::Lt | MathOp::Le | MathOp::Gt | MathOp::Ge) {
            let ord = l.partial_cmp(&r);
            let result = match (op, ord) {
                (MathOp::Eq, _) => l == r,
                (MathOp::Ne, _) => l != r,
                (MathOp::Lt, Some(o)) => o.is_lt(),
                (MathOp::Le, Some(o)) => o.is_le(),
                (MathOp::Gt, Some(o)) => o.is_gt(),
                (MathOp::Ge, Some(o)) => o.is_ge(),
                _ => false,
            };
            return Ok(Literal::Boolean(result));
        }

        if matches!(l, Literal::Float(_)) || matches!(r, Literal::Float(_)) {
            let a = l.as_f64().unwrap_or(0.0);
            let b = r.as_f64().unwrap_or(0.0);
            let value = match op {
                MathOp::Add => a + b,
                MathOp::Sub => a - b,
                MathOp::Mul => a * b,
                MathOp::Div => {
                    if b == 0.0 {
                        return Err(EvalError::new(EvalErrorKind::DivisionByZero, span));
                    }
                    a / b
                }
                _ => return Err(invalid_operand(span, "unsupported float operator".into())),
            };
            return Ok(Literal::Float(value));
        }

        let signed = matches!(l, Literal::Signed(_)) || matches!(r, Literal::Signed(_));
        let a = l.as_i128().ok_or_else(|| invalid_operand(span, "expected a number".into()))?;
        let b = r.as_i128().ok_or_else(|| invalid_operand(span, "expected a number".into()))?;

        let value = match op {
            MathOp::Add => a.wrapping_add(b),
            MathOp::Sub => a.wrapping_sub(b),
            MathOp::Mul => a.wrapping_mul(b),
            MathOp::Div => {
                if b == 0 {
                    return Err(EvalError::new(EvalErrorKind::DivisionByZero, span));
                }
                a.wrapping_div(b)
            }
            MathOp::Mod => {
                if b == 0 {
                    return Err(EvalError::new(EvalErrorKind::DivisionByZero, span));
                }
                a.wrapping_rem(b)
            }
            MathOp::Shl | MathOp::Shr => {
                if b < 0 || b >= 128 {
                    return Err(invalid_operand(span, "shift amount out of range".into()));
                }
                if op == MathOp::Shl {
                    a.wrapping_shl(b as u32)
                } else {
                    a.wrapping_shr(b as u32)
                }
            }
            MathOp::BitAnd => a & b,
            MathOp::BitOr => a | b,
            MathOp::BitXor => a ^ b,
            _ => return Err(invalid_operand(span, "unsupported operator".into())),
        };

        Ok(if signed {
            Literal::Signed(value)
        } else {
            Literal::Unsigned(value as u128)
        })
    }

    fn eval_sizeof(&mut self, operand: &Operand, span: Span) -> EvalResult<Literal> {
        let saved = self.data_offset;
        let saved_pattern_count = self.pattern_count;
        let size = match operand {
            Operand::Type(ty) => self.type_width(ty, span)?,
            Operand::Expr(e) => match e.as_ref() {
                Expr::RValue(path) => self.resolve_path(path)?.size,
                other => {
                    self.eval_expr(other)?;
                    0
                }
            },
        };
        self.data_offset = saved;
        self.pattern_count = saved_pattern_count;
        Ok(Literal::Unsigned(size as u128))
    }

    fn eval_addressof(&mut self, operand: &Operand, span: Span) -> EvalResult<Literal> {
        match operand {
            Operand::Expr(e) => match e.as_ref() {
                Expr::RValue(path) => Ok(Literal::Unsigned(self.resolve_path(path)?.offset as u128)),
                _ => Ok(Literal::Unsigned(self.data_offset as u128)),
            },
            Operand::Type(_) => Ok(Literal::Unsigned(self.data_offset as u128)),
        }
        .map_err(|e: EvalError| e)
        .or(Err(EvalError::new(
            EvalErrorKind::InvalidOperand("addressof expects an lvalue".into()),
            span,
        )))
    }

    // -----------------------------------------------------------------
    // Functions (§4.6 "Function semantics")
    // -----------------------------------------------------------------

    fn eval_call(&mut self, name: &str, args: &[Expr], span: Span) -> EvalResult<Literal> {
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval_expr(a)?);
        }

        if let Some(native) = builtins::lookup(name) {
            return native(&values, span);
        }

        let Some(func) = self.functions.get(name).cloned() else {
            return Err(EvalError::new(EvalErrorKind::NoSuchFunction(name.to_string()), span));
        };

        if values.len() != func.params.len() {
            return Err(EvalError::new(
                EvalErrorKind::ArityMismatch {
                    name: name.to_string(),
                    expected: format!("exactly {}", func.params.len()),
                    got: values.len(),
                },
                span,
            ));
        }

        self.call_depth += 1;
        if self.call_depth > self.max_call_depth {
            self.call_depth -= 1;
            return Err(EvalError::new(EvalErrorKind::RecursionLimit, span));
        }

        self.push_scope();
        for (param, value) in func.params.iter().zip(values.iter()) {
            let mut pattern = self.literal_to_pattern(value, &param.ty)?;
            pattern.local = true;
            pattern.variable_name = param.name.clone();
            self.current_scope_mut().push(pattern);
        }

        let mut result = Ok(Flow::Normal);
        for stmt in &func.body {
            match self.execute_stmt(stmt) {
                Ok(flow) if flow.is_stopped() => {
                    result = Ok(flow);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.pop_scope();
        self.call_depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value.unwrap_or(Literal::Unsigned(0))),
            _ => Ok(Literal::Unsigned(0)),
        }
    }

    // -----------------------------------------------------------------
    // Statements (§4.6 "Statement execution contract")
    // -----------------------------------------------------------------

    fn execute_stmt(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        self.check_cancel(stmt.span())?;
        match stmt {
            Stmt::VarDecl(v) => {
                let pattern = self.create_var_pattern(v)?;
                self.current_scope_mut().push(pattern);
                Ok(Flow::Normal)
            }
            Stmt::Assign(a) => {
                self.execute_assign(a)?;
                Ok(Flow::Normal)
            }
            Stmt::Expr(e, _) => {
                self.eval_expr(e)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(expr, _) => {
                let value = match expr {
                    Some(e) => Some(self.eval_expr(e)?),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let branch = if self.eval_expr(condition)?.as_bool().unwrap_or(false) {
                    then_branch
                } else {
                    else_branch
                };
                self.execute_block(branch)
            }
            Stmt::While { condition, body, span } => {
                loop {
                    self.check_cancel(*span)?;
                    self.consume_loop_budget(*span)?;
                    if !self.eval_expr(condition)?.as_bool().unwrap_or(false) {
                        break;
                    }
                    match self.execute_block(body)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => continue,
                        returned @ Flow::Return(_) => return Ok(returned),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts, _) => self.execute_block(stmts),
        }
    }

    fn execute_block(&mut self, stmts: &[Stmt]) -> EvalResult<Flow> {
        self.push_scope();
        let mut flow = Flow::Normal;
        for stmt in stmts {
            flow = self.execute_stmt(stmt)?;
            if flow.is_stopped() {
                break;
            }
        }
        self.pop_scope();
        Ok(flow)
    }

    fn execute_assign(&mut self, assign: &crate::parser::ast::Assignment) -> EvalResult<()> {
        let name = match &assign.target {
            Expr::RValue(path) if path.segments.is_empty() => match &path.head {
                PathHead::Ident(n) => n.clone(),
                _ => {
                    return Err(invalid_operand(assign.span, "cannot assign to this expression".into()))
                }
            },
            _ => return Err(invalid_operand(assign.span, "cannot assign to this expression".into())),
        };

        let new_value = match assign.op {
            None => self.eval_expr(&assign.value)?,
            Some(op) => {
                let current = self.eval_expr(&assign.target)?;
                let current_lit = Expr::Literal(current, assign.span);
                self.eval_math(&current_lit, op, &assign.value, assign.span)?
            }
        };

        let Some(pattern) = self.find_pattern_mut(&name) else {
            return Err(EvalError::new(EvalErrorKind::NoSuchVariable(name), assign.span));
        };
        if !pattern.local {
            return Err(invalid_operand(
                assign.span,
                format!("cannot assign to '{name}': it is backed by the provider, not a local"),
            ));
        }
        pattern.kind = match &new_value {
            Literal::Unsigned(v) => PatternKind::Unsigned(*v),
            Literal::Signed(v) => PatternKind::Signed(*v),
            Literal::Float(v) => PatternKind::Float(*v),
            Literal::Boolean(v) => PatternKind::Boolean(*v),
            Literal::Char(v) => PatternKind::Character(*v),
            Literal::Char16(v) => PatternKind::Character16(*v),
            Literal::Str(v) => PatternKind::String(v.clone()),
            Literal::Pattern(p) => p.kind.clone(),
        };
        Ok(())
    }
}

fn path_head_hint(path: &RValuePath) -> &str {
    match path.segments.first() {
        Some(PathSegment::Member(name)) => name.as_str(),
        _ => "",
    }
}

fn invalid_operand(span: Span, message: String) -> EvalError {
    EvalError::new(EvalErrorKind::InvalidOperand(message), span)
}

fn bad_array(span: Span, message: &str) -> EvalError {
    EvalError::new(EvalErrorKind::BadArraySize(message.to_string()), span)
}

fn builtin_width(ty: &TypeRef) -> Option<u64> {
    match ty {
        TypeRef::Builtin(v, _) => v.byte_width(),
        TypeRef::Named(_) => None,
    }
}

fn bytes_to_u128(bytes: &[u8], endian: Endian) -> u128 {
    let mut buf = [0u8; 16];
    match endian {
        Endian::Little => {
            buf[..bytes.len()].copy_from_slice(bytes);
            u128::from_le_bytes(buf)
        }
        Endian::Big => {
            let offset = 16 - bytes.len();
            buf[offset..].copy_from_slice(bytes);
            u128::from_be_bytes(buf)
        }
    }
}

fn sign_extend(raw: u128, width: u64) -> i128 {
    let bits = width * 8;
    if bits >= 128 {
        return raw as i128;
    }
    let shift = 128 - bits;
    ((raw << shift) as i128) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::parse;
    use crate::source::Source;

    fn eval(src: &str, bytes: &[u8]) -> EvalResult<Vec<Pattern>> {
        let source = Source::new("test", src);
        let tokens = Lexer::new(&source).lex().unwrap();
        let program = parse(tokens).unwrap();
        let mut provider = SliceProvider::new(bytes.to_vec());
        let mut evaluator = Evaluator::new(&mut provider);
        evaluator.evaluate(&program)
    }

    #[test]
    fn primitive_placement() {
        let patterns = eval("u32 x @ 0x00;", &[1, 2, 3, 4]).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].offset, 0);
        assert_eq!(patterns[0].size, 4);
        assert_eq!(patterns[0].kind, PatternKind::Unsigned(0x04030201));
    }

    #[test]
    fn struct_of_two_fields() {
        let patterns = eval("struct P { u16 a; u16 b; }; P p @ 0;", &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        let PatternKind::Struct { members, .. } = &patterns[0].kind else {
            panic!("expected struct");
        };
        assert_eq!(members[0].kind, PatternKind::Unsigned(0xBBAA));
        assert_eq!(members[0].offset, 0);
        assert_eq!(members[1].kind, PatternKind::Unsigned(0xDDCC));
        assert_eq!(members[1].offset, 2);
    }

    #[test]
    fn static_array() {
        let patterns = eval("u8 xs[4] @ 0;", &[1, 2, 3, 4]).unwrap();
        let PatternKind::StaticArray { entry_count, .. } = &patterns[0].kind else {
            panic!("expected static array");
        };
        assert_eq!(*entry_count, 4);
    }

    #[test]
    fn pointer_dereference() {
        let patterns = eval("u16 v; u16 *p : u8 @ 0;", &[0x02, 0xAA, 0xBB]).unwrap();
        let ptr = &patterns[1];
        let PatternKind::Pointer { pointee, pointed_at_address, .. } = &ptr.kind else {
            panic!("expected pointer");
        };
        assert_eq!(*pointed_at_address, 2);
        assert_eq!(pointee.kind, PatternKind::Unsigned(0xBBAA));
    }

    #[test]
    fn bitfield_msb_first() {
        let patterns = eval("bitfield B { hi : 4; lo : 4; }; B b @ 0;", &[0xAB]).unwrap();
        let PatternKind::Bitfield { fields } = &patterns[0].kind else {
            panic!("expected bitfield");
        };
        assert_eq!(fields[0].kind, PatternKind::BitfieldField {
            bit_offset: 0,
            bit_size: 4,
            value: 0xA,
            owning_bitfield: "B".into(),
        });
        assert_eq!(fields[1].kind, PatternKind::BitfieldField {
            bit_offset: 4,
            bit_size: 4,
            value: 0xB,
            owning_bitfield: "B".into(),
        });
    }

    #[test]
    fn division_by_zero_aborts() {
        let err = eval("u8 x @ 0; u8 y @ (x / 0);", &[0]).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
    }

    #[test]
    fn offsets_are_monotonic_within_a_struct() {
        let patterns = eval(
            "struct P { u8 a; u16 b; u32 c; }; P p @ 0;",
            &[0, 0, 0, 0, 0, 0, 0],
        )
        .unwrap();
        let PatternKind::Struct { members, .. } = &patterns[0].kind else {
            panic!("expected struct");
        };
        let offsets: Vec<u64> = members.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 1, 3]);
    }

    #[test]
    fn union_members_share_start_offset() {
        let patterns = eval("union U { u8 a; u32 b; }; U u @ 0;", &[1, 2, 3, 4]).unwrap();
        assert_eq!(patterns[0].size, 4);
        let PatternKind::Union { members } = &patterns[0].kind else {
            panic!("expected union");
        };
        assert!(members.iter().all(|m| m.offset == 0));
    }
}
