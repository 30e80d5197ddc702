//! Token stream -> syntax tree, by direct recursive descent with
//! precedence climbing for expressions (§4.3 "Grammar"). The teacher's
//! `Comb` combinator DSL doesn't scale to this language's ~15 precedence
//! tiers, so this module is written as plain functions instead, in the
//! spirit of the teacher's per-statement-form parse functions and its
//! `Tokens<T>` checkpoint/restore plumbing.

pub mod ast;
mod error;

pub use error::ParseError;

use crate::lexer::{IdKind, Keyword, Operator, Separator, Token, TokenKind, ValueType};
use crate::source::Span;

use ast::{
    ArrayLen, Assignment, Attribute, BitfieldDecl, BitfieldEntry, Direction, EnumDecl, EnumEntry,
    Expr, FnDecl, ImportDecl, Item, Member, NamespaceDecl, Operand, Param, PathHead, PathSegment,
    Program, RValuePath, ScopeResolutionPath, Stmt, TypedefDecl, TypeRef, UdtDecl, UdtKind,
    VarDecl,
};

pub type ParseResult<T> = Result<T, ParseError>;

/// Token cursor modeled on the teacher's `Tokens<T>`: a flat index into a
/// owned vector, with checkpoint/restore for backtracking instead of a
/// true iterator so arbitrary lookahead is cheap.
struct ParseState {
    tokens: Vec<Token>,
    index: usize,
}

impl ParseState {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    fn get_index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    fn raw_peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    /// Skip over comment tokens; the highlighter consumes the raw stream
    /// itself, so the parser never needs to see them.
    fn skip_trivia(&mut self) {
        while self.index < self.tokens.len()
            && matches!(self.tokens[self.index].kind, TokenKind::Comment { .. })
        {
            self.index += 1;
        }
    }

    fn peek(&mut self) -> &Token {
        self.skip_trivia();
        self.raw_peek()
    }

    fn peek_span(&mut self) -> Span {
        self.peek().span
    }

    fn next(&mut self) -> Token {
        self.skip_trivia();
        let tok = self.raw_peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        tok
    }

    fn at_eof(&mut self) -> bool {
        self.peek().is_eof()
    }

    fn eat_operator(&mut self, op: Operator) -> bool {
        if matches!(&self.peek().kind, TokenKind::Operator(o) if *o == op) {
            self.next();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if matches!(&self.peek().kind, TokenKind::Keyword(k) if *k == kw) {
            self.next();
            true
        } else {
            false
        }
    }

    fn eat_separator(&mut self, sep: Separator) -> bool {
        if matches!(&self.peek().kind, TokenKind::Separator(s) if *s == sep) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect_operator(&mut self, op: Operator) -> ParseResult<Span> {
        let span = self.peek_span();
        if self.eat_operator(op) {
            Ok(span)
        } else {
            Err(ParseError::unexpected(&format!("`{op:?}`"), self.peek().kind.clone(), span))
        }
    }

    fn expect_separator(&mut self, sep: Separator) -> ParseResult<Span> {
        let span = self.peek_span();
        if self.eat_separator(sep) {
            Ok(span)
        } else {
            Err(ParseError::unexpected(&format!("`{sep:?}`"), self.peek().kind.clone(), span))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<(String, Span)> {
        let span = self.peek_span();
        let tok = self.next();
        match tok.kind {
            TokenKind::Identifier { text, .. } => Ok((text, span)),
            other => Err(ParseError::unexpected("an identifier", other, span)),
        }
    }
}

pub fn parse(tokens: Vec<Token>) -> ParseResult<Program> {
    let mut state = ParseState::new(tokens);
    let mut items = Vec::new();
    while !state.at_eof() {
        items.push(parse_item(&mut state)?);
    }
    Ok(Program { items })
}

fn parse_item(state: &mut ParseState) -> ParseResult<Item> {
    let attrs_leading = Vec::new();
    let start = state.peek_span();
    match &state.peek().kind {
        TokenKind::Keyword(Keyword::Struct) => parse_udt(state, UdtKind::Struct).map(Item::Udt),
        TokenKind::Keyword(Keyword::Union) => parse_udt(state, UdtKind::Union).map(Item::Udt),
        TokenKind::Keyword(Keyword::Enum) => parse_enum(state).map(Item::Enum),
        TokenKind::Keyword(Keyword::Bitfield) => parse_bitfield(state).map(Item::Bitfield),
        TokenKind::Keyword(Keyword::Using) => parse_typedef(state).map(Item::Typedef),
        TokenKind::Keyword(Keyword::Fn) => parse_fn(state).map(Item::Function),
        TokenKind::Keyword(Keyword::Namespace) => parse_namespace(state).map(Item::Namespace),
        TokenKind::Keyword(Keyword::Import) => parse_import(state).map(Item::Import),
        TokenKind::Keyword(Keyword::In) | TokenKind::Keyword(Keyword::Out) => {
            parse_var_decl_statement(state).map(|d| match d {
                Stmt::VarDecl(v) => Item::Var(v),
                _ => unreachable!(),
            })
        }
        _ => {
            let _ = &attrs_leading;
            let decl = parse_var_decl(state, start)?;
            state.expect_operator(Operator::Semicolon)?;
            Ok(Item::Var(decl))
        }
    }
}

fn parse_attributes(state: &mut ParseState) -> ParseResult<Vec<Attribute>> {
    let mut attrs = Vec::new();
    while matches!(&state.peek().kind, TokenKind::Separator(Separator::LBracket)) {
        let start = state.peek_span();
        // `[[` is lexed as two `LBracket` separators back to back.
        state.expect_separator(Separator::LBracket)?;
        state.expect_separator(Separator::LBracket)?;
        loop {
            let (name, name_span) = state.expect_identifier()?;
            let value = if state.eat_separator(Separator::LParen) {
                let (text, _) = expect_string_literal(state)?;
                state.expect_separator(Separator::RParen)?;
                Some(text)
            } else {
                None
            };
            attrs.push(Attribute {
                name,
                value,
                span: name_span,
            });
            if !state.eat_operator(Operator::Comma) {
                break;
            }
        }
        state.expect_separator(Separator::RBracket)?;
        state.expect_separator(Separator::RBracket)?;
        let _ = start;
    }
    Ok(attrs)
}

fn expect_string_literal(state: &mut ParseState) -> ParseResult<(String, Span)> {
    let span = state.peek_span();
    let tok = state.next();
    match tok.kind {
        TokenKind::String(s) => Ok((s, span)),
        other => Err(ParseError::unexpected("a string literal", other, span)),
    }
}

fn parse_type_ref(state: &mut ParseState) -> ParseResult<TypeRef> {
    let span = state.peek_span();
    if let TokenKind::ValueType(v) = state.peek().kind {
        state.next();
        return Ok(TypeRef::Builtin(v, span));
    }
    let path = parse_scope_resolution_path(state)?;
    Ok(TypeRef::Named(path))
}

fn parse_scope_resolution_path(state: &mut ParseState) -> ParseResult<ScopeResolutionPath> {
    let start = state.peek_span();
    let leading_root = state.eat_operator(Operator::ScopeRes);
    let mut segments = Vec::new();
    let (first, _) = state.expect_identifier()?;
    segments.push(first);
    while state.eat_operator(Operator::ScopeRes) {
        let (seg, _) = state.expect_identifier()?;
        segments.push(seg);
    }
    Ok(ScopeResolutionPath {
        segments,
        leading_root,
        span: start,
    })
}

// ---------------------------------------------------------------------
// User-defined types
// ---------------------------------------------------------------------

fn parse_udt(state: &mut ParseState, kind: UdtKind) -> ParseResult<UdtDecl> {
    let start = state.peek_span();
    state.next(); // `struct` | `union`
    let (name, _) = state.expect_identifier()?;
    let template_params = parse_template_params(state)?;
    let mut inherits = Vec::new();
    if state.eat_operator(Operator::Colon) {
        inherits.push(parse_type_ref(state)?);
        while state.eat_operator(Operator::Comma) {
            inherits.push(parse_type_ref(state)?);
        }
    }
    state.expect_separator(Separator::LBrace)?;
    let members = parse_members(state)?;
    state.expect_separator(Separator::RBrace)?;
    let attributes = parse_attributes(state)?;
    state.expect_operator(Operator::Semicolon)?;
    Ok(UdtDecl {
        kind,
        name,
        template_params,
        inherits,
        members,
        attributes,
        span: start,
    })
}

fn parse_template_params(state: &mut ParseState) -> ParseResult<Vec<String>> {
    let mut params = Vec::new();
    if state.eat_operator(Operator::Lt) {
        let (first, _) = state.expect_identifier()?;
        params.push(first);
        while state.eat_operator(Operator::Comma) {
            let (p, _) = state.expect_identifier()?;
            params.push(p);
        }
        state.expect_operator(Operator::Gt)?;
    }
    Ok(params)
}

fn parse_members(state: &mut ParseState) -> ParseResult<Vec<Member>> {
    let mut members = Vec::new();
    while !matches!(&state.peek().kind, TokenKind::Separator(Separator::RBrace)) {
        members.push(parse_member(state)?);
    }
    Ok(members)
}

fn parse_member(state: &mut ParseState) -> ParseResult<Member> {
    let start = state.peek_span();
    if state.eat_keyword(Keyword::If) {
        state.expect_separator(Separator::LParen)?;
        let condition = parse_expr(state)?;
        state.expect_separator(Separator::RParen)?;
        state.expect_separator(Separator::LBrace)?;
        let then_branch = parse_members(state)?;
        state.expect_separator(Separator::RBrace)?;
        let mut else_branch = Vec::new();
        if state.eat_keyword(Keyword::Else) {
            if matches!(&state.peek().kind, TokenKind::Keyword(Keyword::If)) {
                else_branch.push(parse_member(state)?);
            } else {
                state.expect_separator(Separator::LBrace)?;
                else_branch = parse_members(state)?;
                state.expect_separator(Separator::RBrace)?;
            }
        }
        return Ok(Member::Conditional {
            condition,
            then_branch,
            else_branch,
            span: start,
        });
    }
    let decl = parse_var_decl(state, start)?;
    state.expect_operator(Operator::Semicolon)?;
    if matches!(decl.ty, TypeRef::Builtin(ValueType::Padding, _)) {
        let count = decl
            .array
            .map(|a| match a {
                ArrayLen::Fixed(e) | ArrayLen::While(e) => e,
                ArrayLen::Unbounded => Expr::Literal(crate::value::Literal::Unsigned(1), start),
            })
            .unwrap_or(Expr::Literal(crate::value::Literal::Unsigned(1), start));
        return Ok(Member::Padding { count, span: start });
    }
    Ok(Member::Field(decl))
}

fn parse_enum(state: &mut ParseState) -> ParseResult<EnumDecl> {
    let start = state.peek_span();
    state.next(); // `enum`
    let (name, _) = state.expect_identifier()?;
    let underlying = if state.eat_operator(Operator::Colon) {
        parse_type_ref(state)?
    } else {
        TypeRef::Builtin(ValueType::U32, start)
    };
    state.expect_separator(Separator::LBrace)?;
    let mut entries = Vec::new();
    while !matches!(&state.peek().kind, TokenKind::Separator(Separator::RBrace)) {
        let (ename, espan) = state.expect_identifier()?;
        let value = if state.eat_operator(Operator::Assign) {
            Some(parse_expr(state)?)
        } else {
            None
        };
        entries.push(EnumEntry {
            name: ename,
            value,
            span: espan,
        });
        if !state.eat_operator(Operator::Comma) {
            break;
        }
    }
    state.expect_separator(Separator::RBrace)?;
    let attributes = parse_attributes(state)?;
    state.expect_operator(Operator::Semicolon)?;
    Ok(EnumDecl {
        name,
        underlying,
        entries,
        attributes,
        span: start,
    })
}

fn parse_bitfield(state: &mut ParseState) -> ParseResult<BitfieldDecl> {
    let start = state.peek_span();
    state.next(); // `bitfield`
    let (name, _) = state.expect_identifier()?;
    state.expect_separator(Separator::LBrace)?;
    let mut entries = Vec::new();
    while !matches!(&state.peek().kind, TokenKind::Separator(Separator::RBrace)) {
        let (ename, espan) = state.expect_identifier()?;
        state.expect_operator(Operator::Colon)?;
        let size = parse_expr(state)?;
        state.expect_operator(Operator::Semicolon)?;
        entries.push(BitfieldEntry {
            name: ename,
            size,
            span: espan,
        });
    }
    state.expect_separator(Separator::RBrace)?;
    let attributes = parse_attributes(state)?;
    state.expect_operator(Operator::Semicolon)?;
    Ok(BitfieldDecl {
        name,
        entries,
        attributes,
        span: start,
    })
}

fn parse_typedef(state: &mut ParseState) -> ParseResult<TypedefDecl> {
    let start = state.peek_span();
    state.next(); // `using`
    let (name, _) = state.expect_identifier()?;
    let template_params = parse_template_params(state)?;
    state.expect_operator(Operator::Assign)?;
    let target = parse_type_ref(state)?;
    state.expect_operator(Operator::Semicolon)?;
    Ok(TypedefDecl {
        name,
        template_params,
        target,
        span: start,
    })
}

fn parse_fn(state: &mut ParseState) -> ParseResult<FnDecl> {
    let start = state.peek_span();
    state.next(); // `fn`
    let (name, _) = state.expect_identifier()?;
    state.expect_separator(Separator::LParen)?;
    let mut params = Vec::new();
    while !matches!(&state.peek().kind, TokenKind::Separator(Separator::RParen)) {
        let pspan = state.peek_span();
        let ty = parse_type_ref(state)?;
        let (pname, _) = state.expect_identifier()?;
        params.push(Param {
            ty,
            name: pname,
            span: pspan,
        });
        if !state.eat_operator(Operator::Comma) {
            break;
        }
    }
    state.expect_separator(Separator::RParen)?;
    state.expect_separator(Separator::LBrace)?;
    let body = parse_stmts(state)?;
    state.expect_separator(Separator::RBrace)?;
    let attributes = parse_attributes(state)?;
    Ok(FnDecl {
        name,
        params,
        body,
        attributes,
        span: start,
    })
}

fn parse_namespace(state: &mut ParseState) -> ParseResult<NamespaceDecl> {
    let start = state.peek_span();
    state.next(); // `namespace`
    let mut path = Vec::new();
    let (first, _) = state.expect_identifier()?;
    path.push(first);
    while state.eat_operator(Operator::ScopeRes) {
        let (seg, _) = state.expect_identifier()?;
        path.push(seg);
    }
    state.expect_separator(Separator::LBrace)?;
    let mut body = Vec::new();
    while !matches!(&state.peek().kind, TokenKind::Separator(Separator::RBrace)) {
        body.push(parse_item(state)?);
    }
    state.expect_separator(Separator::RBrace)?;
    Ok(NamespaceDecl {
        path,
        body,
        span: start,
    })
}

fn parse_import(state: &mut ParseState) -> ParseResult<ImportDecl> {
    let start = state.peek_span();
    state.next(); // `import`
    let mut segments = Vec::new();
    let (first, _) = state.expect_identifier()?;
    segments.push(first);
    while state.eat_operator(Operator::ScopeRes) {
        let (seg, _) = state.expect_identifier()?;
        segments.push(seg);
    }
    state.expect_operator(Operator::Semicolon)?;
    Ok(ImportDecl {
        path: segments.join("::"),
        span: start,
    })
}

// ---------------------------------------------------------------------
// Declarations and statements
// ---------------------------------------------------------------------

fn parse_var_decl(state: &mut ParseState, start: Span) -> ParseResult<VarDecl> {
    let direction = if state.eat_keyword(Keyword::In) {
        Some(Direction::In)
    } else if state.eat_keyword(Keyword::Out) {
        Some(Direction::Out)
    } else {
        None
    };
    let ty = parse_type_ref(state)?;
    let is_pointer = state.eat_operator(Operator::Star);
    let (name, _) = state.expect_identifier()?;
    let pointer_size = if is_pointer {
        state.expect_operator(Operator::Colon)?;
        Some(parse_type_ref(state)?)
    } else {
        None
    };
    let array = if pointer_size.is_some() {
        None
    } else if state.eat_separator(Separator::LBracket) {
        if state.eat_separator(Separator::RBracket) {
            Some(ArrayLen::Unbounded)
        } else if state.eat_keyword(Keyword::While) {
            state.expect_separator(Separator::LParen)?;
            let cond = parse_expr(state)?;
            state.expect_separator(Separator::RParen)?;
            state.expect_separator(Separator::RBracket)?;
            Some(ArrayLen::While(cond))
        } else {
            let len = parse_expr(state)?;
            state.expect_separator(Separator::RBracket)?;
            Some(ArrayLen::Fixed(len))
        }
    } else {
        None
    };
    let initializer = if state.eat_operator(Operator::Assign) {
        Some(parse_expr(state)?)
    } else {
        None
    };
    let placement = if state.eat_operator(Operator::At) {
        Some(parse_expr(state)?)
    } else {
        None
    };
    let attributes = parse_attributes(state)?;
    Ok(VarDecl {
        ty,
        name,
        array,
        initializer,
        placement,
        direction,
        pointer_size,
        attributes,
        span: start,
    })
}

fn parse_var_decl_statement(state: &mut ParseState) -> ParseResult<Stmt> {
    let start = state.peek_span();
    let decl = parse_var_decl(state, start)?;
    state.expect_operator(Operator::Semicolon)?;
    Ok(Stmt::VarDecl(decl))
}

fn parse_stmts(state: &mut ParseState) -> ParseResult<Vec<Stmt>> {
    let mut stmts = Vec::new();
    while !matches!(&state.peek().kind, TokenKind::Separator(Separator::RBrace)) {
        stmts.push(parse_stmt(state)?);
    }
    Ok(stmts)
}

fn parse_stmt(state: &mut ParseState) -> ParseResult<Stmt> {
    let start = state.peek_span();
    match &state.peek().kind {
        TokenKind::Keyword(Keyword::Return) => {
            state.next();
            let value = if matches!(&state.peek().kind, TokenKind::Operator(Operator::Semicolon))
            {
                None
            } else {
                Some(parse_expr(state)?)
            };
            state.expect_operator(Operator::Semicolon)?;
            Ok(Stmt::Return(value, start))
        }
        TokenKind::Keyword(Keyword::Break) => {
            state.next();
            state.expect_operator(Operator::Semicolon)?;
            Ok(Stmt::Break(start))
        }
        TokenKind::Keyword(Keyword::Continue) => {
            state.next();
            state.expect_operator(Operator::Semicolon)?;
            Ok(Stmt::Continue(start))
        }
        TokenKind::Keyword(Keyword::If) => parse_if_stmt(state),
        TokenKind::Keyword(Keyword::While) => parse_while_stmt(state),
        TokenKind::Keyword(Keyword::For) => parse_for_stmt(state),
        TokenKind::Keyword(Keyword::In) | TokenKind::Keyword(Keyword::Out) => {
            parse_var_decl_statement(state)
        }
        TokenKind::ValueType(_) => parse_var_decl_statement(state),
        _ => parse_decl_or_expr_stmt(state),
    }
}

fn parse_if_stmt(state: &mut ParseState) -> ParseResult<Stmt> {
    let start = state.peek_span();
    state.next(); // `if`
    state.expect_separator(Separator::LParen)?;
    let condition = parse_expr(state)?;
    state.expect_separator(Separator::RParen)?;
    state.expect_separator(Separator::LBrace)?;
    let then_branch = parse_stmts(state)?;
    state.expect_separator(Separator::RBrace)?;
    let mut else_branch = Vec::new();
    if state.eat_keyword(Keyword::Else) {
        if matches!(&state.peek().kind, TokenKind::Keyword(Keyword::If)) {
            else_branch.push(parse_if_stmt(state)?);
        } else {
            state.expect_separator(Separator::LBrace)?;
            else_branch = parse_stmts(state)?;
            state.expect_separator(Separator::RBrace)?;
        }
    }
    Ok(Stmt::If {
        condition,
        then_branch,
        else_branch,
        span: start,
    })
}

fn parse_while_stmt(state: &mut ParseState) -> ParseResult<Stmt> {
    let start = state.peek_span();
    state.next(); // `while`
    state.expect_separator(Separator::LParen)?;
    let condition = parse_expr(state)?;
    state.expect_separator(Separator::RParen)?;
    state.expect_separator(Separator::LBrace)?;
    let body = parse_stmts(state)?;
    state.expect_separator(Separator::RBrace)?;
    Ok(Stmt::While {
        condition,
        body,
        span: start,
    })
}

/// Desugars into `{ init; while (cond) { body...; step; } }` so the AST
/// never needs a dedicated `for` node (see `Stmt::Block`'s doc comment).
fn parse_for_stmt(state: &mut ParseState) -> ParseResult<Stmt> {
    let start = state.peek_span();
    state.next(); // `for`
    state.expect_separator(Separator::LParen)?;
    let init = parse_stmt(state)?;
    let condition = parse_expr(state)?;
    state.expect_operator(Operator::Semicolon)?;
    let step = parse_assignment_or_expr(state)?;
    state.expect_separator(Separator::RParen)?;
    state.expect_separator(Separator::LBrace)?;
    let mut body = parse_stmts(state)?;
    state.expect_separator(Separator::RBrace)?;
    body.push(step);
    Ok(Stmt::Block(
        vec![
            init,
            Stmt::While {
                condition,
                body,
                span: start,
            },
        ],
        start,
    ))
}

fn parse_decl_or_expr_stmt(state: &mut ParseState) -> ParseResult<Stmt> {
    // One-token lookahead: `Ident Ident` is a declaration (`T name;`); a
    // bare path followed by `=`/`;`/an operator is an expression statement
    // or assignment.
    if matches!(&state.peek().kind, TokenKind::Identifier { .. }) {
        let checkpoint = state.get_index();
        let _ = parse_scope_resolution_path(state);
        let looks_like_decl = matches!(&state.peek().kind, TokenKind::Identifier { .. })
            || matches!(&state.peek().kind, TokenKind::Operator(Operator::Star));
        state.set_index(checkpoint);
        if looks_like_decl {
            return parse_var_decl_statement(state);
        }
    }
    parse_assignment_or_expr(state)
}

fn parse_assignment_or_expr(state: &mut ParseState) -> ParseResult<Stmt> {
    let start = state.peek_span();
    let expr = parse_expr(state)?;
    let compound = match &state.peek().kind {
        TokenKind::Operator(Operator::Assign) => Some(None),
        TokenKind::Operator(Operator::PlusEq) => Some(Some(ast::MathOp::Add)),
        TokenKind::Operator(Operator::MinusEq) => Some(Some(ast::MathOp::Sub)),
        TokenKind::Operator(Operator::StarEq) => Some(Some(ast::MathOp::Mul)),
        TokenKind::Operator(Operator::SlashEq) => Some(Some(ast::MathOp::Div)),
        TokenKind::Operator(Operator::PercentEq) => Some(Some(ast::MathOp::Mod)),
        TokenKind::Operator(Operator::AndEq) => Some(Some(ast::MathOp::BitAnd)),
        TokenKind::Operator(Operator::OrEq) => Some(Some(ast::MathOp::BitOr)),
        TokenKind::Operator(Operator::XorEq) => Some(Some(ast::MathOp::BitXor)),
        TokenKind::Operator(Operator::ShlEq) => Some(Some(ast::MathOp::Shl)),
        TokenKind::Operator(Operator::ShrEq) => Some(Some(ast::MathOp::Shr)),
        _ => None,
    };
    if let Some(op) = compound {
        state.next();
        let value = parse_expr(state)?;
        state.expect_operator(Operator::Semicolon)?;
        return Ok(Stmt::Assign(Assignment {
            target: expr,
            op,
            value,
            span: start,
        }));
    }
    state.expect_operator(Operator::Semicolon)?;
    Ok(Stmt::Expr(expr, start))
}

// ---------------------------------------------------------------------
// Expressions: precedence-climbing recursive descent (§4.3).
//
// ternary
//   -> logical-or -> logical-xor -> logical-and
//   -> bitwise-or -> bitwise-xor -> bitwise-and
//   -> equality -> relational -> shift
//   -> additive -> multiplicative -> unary -> postfix -> primary
// ---------------------------------------------------------------------

fn parse_expr(state: &mut ParseState) -> ParseResult<Expr> {
    parse_ternary(state)
}

fn parse_ternary(state: &mut ParseState) -> ParseResult<Expr> {
    let start = state.peek_span();
    let cond = parse_binary(state, 0)?;
    if state.eat_operator(Operator::Question) {
        let then_branch = parse_ternary(state)?;
        state.expect_operator(Operator::Colon)?;
        let else_branch = parse_ternary(state)?;
        return Ok(Expr::Ternary(
            Box::new(cond),
            Box::new(then_branch),
            Box::new(else_branch),
            start,
        ));
    }
    Ok(cond)
}

/// Binary operator precedence tiers, loosest first; `parse_binary` climbs
/// from tier `level` down to unary expressions.
const BINARY_TIERS: &[&[(Operator, ast::MathOp)]] = &[
    &[(Operator::OrOr, ast::MathOp::LogOr)],
    &[(Operator::XorXor, ast::MathOp::LogXor)],
    &[(Operator::AndAnd, ast::MathOp::LogAnd)],
    &[(Operator::Or, ast::MathOp::BitOr)],
    &[(Operator::Xor, ast::MathOp::BitXor)],
    &[(Operator::And, ast::MathOp::BitAnd)],
    &[(Operator::Eq, ast::MathOp::Eq), (Operator::NotEq, ast::MathOp::Ne)],
    &[
        (Operator::Lt, ast::MathOp::Lt),
        (Operator::Le, ast::MathOp::Le),
        (Operator::Gt, ast::MathOp::Gt),
        (Operator::Ge, ast::MathOp::Ge),
    ],
    &[(Operator::Shl, ast::MathOp::Shl), (Operator::Shr, ast::MathOp::Shr)],
    &[(Operator::Plus, ast::MathOp::Add), (Operator::Minus, ast::MathOp::Sub)],
    &[
        (Operator::Star, ast::MathOp::Mul),
        (Operator::Slash, ast::MathOp::Div),
        (Operator::Percent, ast::MathOp::Mod),
    ],
];

fn parse_binary(state: &mut ParseState, level: usize) -> ParseResult<Expr> {
    if level >= BINARY_TIERS.len() {
        return parse_unary(state);
    }
    let start = state.peek_span();
    let mut lhs = parse_binary(state, level + 1)?;
    loop {
        let op = match &state.peek().kind {
            TokenKind::Operator(found) => BINARY_TIERS[level]
                .iter()
                .find(|(o, _)| o == found)
                .map(|(_, m)| *m),
            _ => None,
        };
        let Some(op) = op else { break };
        state.next();
        let rhs = parse_binary(state, level + 1)?;
        lhs = Expr::Math(Box::new(lhs), op, Box::new(rhs), start);
    }
    Ok(lhs)
}

fn parse_unary(state: &mut ParseState) -> ParseResult<Expr> {
    let start = state.peek_span();
    let op = match &state.peek().kind {
        TokenKind::Operator(Operator::Plus) => Some(ast::UnaryOp::Plus),
        TokenKind::Operator(Operator::Minus) => Some(ast::UnaryOp::Neg),
        TokenKind::Operator(Operator::Not) => Some(ast::UnaryOp::Not),
        TokenKind::Operator(Operator::Tilde) => Some(ast::UnaryOp::BitNot),
        _ => None,
    };
    if let Some(op) = op {
        state.next();
        let operand = parse_unary(state)?;
        return Ok(Expr::Unary(op, Box::new(operand), start));
    }
    parse_postfix(state)
}

fn parse_postfix(state: &mut ParseState) -> ParseResult<Expr> {
    let start = state.peek_span();
    let mut expr = parse_primary(state)?;
    loop {
        if state.eat_operator(Operator::Dot) {
            let (name, _) = state.expect_identifier()?;
            expr = extend_rvalue(expr, PathSegment::Member(name), start)?;
        } else if state.eat_separator(Separator::LBracket) {
            let index = parse_expr(state)?;
            state.expect_separator(Separator::RBracket)?;
            expr = extend_rvalue(expr, PathSegment::Index(Box::new(index)), start)?;
        } else {
            break;
        }
    }
    Ok(expr)
}

/// Appends a member/index hop onto an existing `RValue` path. A postfix
/// `.member`/`[index]` hop is only legal after a path-producing primary
/// (§4.6 "RValue resolution" walks an identifier chain component by
/// component); anything else (a function call's result, a literal, a
/// parenthesized arithmetic expression) has no path to extend, so this is
/// a parse error rather than a silently fabricated empty-named path.
fn extend_rvalue(expr: Expr, segment: PathSegment, span: Span) -> ParseResult<Expr> {
    match expr {
        Expr::RValue(mut path) => {
            path.segments.push(segment);
            path.span = span;
            Ok(Expr::RValue(path))
        }
        other => Err(ParseError::new(
            "member access / indexing is only valid on an identifier path",
            other.span(),
        )),
    }
}

fn parse_primary(state: &mut ParseState) -> ParseResult<Expr> {
    let start = state.peek_span();
    match state.peek().kind.clone() {
        TokenKind::Integer(v) => {
            state.next();
            // The lexer's carrier is already the widest unsigned width
            // (§3); literals are signed only via a following unary `-`,
            // folded at evaluation time, never at the token itself.
            Ok(Expr::Literal(crate::value::Literal::Unsigned(v), start))
        }
        TokenKind::Float(v) => {
            state.next();
            Ok(Expr::Literal(crate::value::Literal::Float(v), start))
        }
        TokenKind::String(s) => {
            state.next();
            Ok(Expr::Literal(crate::value::Literal::Str(s), start))
        }
        TokenKind::Char { value, is_char16 } => {
            state.next();
            let lit = if is_char16 {
                crate::value::Literal::Char16(value as u16)
            } else {
                crate::value::Literal::Char(char::from_u32(value).unwrap_or('\u{FFFD}'))
            };
            Ok(Expr::Literal(lit, start))
        }
        TokenKind::Keyword(Keyword::True) => {
            state.next();
            Ok(Expr::Literal(crate::value::Literal::Boolean(true), start))
        }
        TokenKind::Keyword(Keyword::False) => {
            state.next();
            Ok(Expr::Literal(crate::value::Literal::Boolean(false), start))
        }
        TokenKind::Keyword(Keyword::This) => {
            state.next();
            parse_path_tail(state, PathHead::This, start)
        }
        TokenKind::Keyword(Keyword::Parent) => {
            state.next();
            parse_path_tail(state, PathHead::Parent, start)
        }
        TokenKind::Operator(Operator::Dollar) => {
            state.next();
            parse_path_tail(state, PathHead::CurrentOffset, start)
        }
        TokenKind::Keyword(Keyword::Sizeof) => {
            state.next();
            let operand = parse_operand(state)?;
            Ok(Expr::SizeOf(operand, start))
        }
        TokenKind::Keyword(Keyword::Addressof) => {
            state.next();
            let operand = parse_operand(state)?;
            Ok(Expr::AddressOf(operand, start))
        }
        TokenKind::Separator(Separator::LParen) => {
            state.next();
            let inner = parse_expr(state)?;
            state.expect_separator(Separator::RParen)?;
            Ok(inner)
        }
        TokenKind::Identifier { text, .. } => {
            state.next();
            if state.eat_separator(Separator::LParen) {
                let args = parse_call_args(state)?;
                return Ok(Expr::FunctionCall(text, args, start));
            }
            if matches!(&state.peek().kind, TokenKind::Operator(Operator::ScopeRes)) {
                let mut segments = vec![text];
                while state.eat_operator(Operator::ScopeRes) {
                    let (seg, _) = state.expect_identifier()?;
                    segments.push(seg);
                }
                return Ok(Expr::ScopeResolution(ScopeResolutionPath {
                    segments,
                    leading_root: false,
                    span: start,
                }));
            }
            parse_path_tail(state, PathHead::Ident(text), start)
        }
        other => Err(ParseError::unexpected("an expression", other, start)),
    }
}

fn parse_path_tail(state: &mut ParseState, head: PathHead, start: Span) -> ParseResult<Expr> {
    let mut segments = Vec::new();
    loop {
        if state.eat_operator(Operator::Dot) {
            let (name, _) = state.expect_identifier()?;
            segments.push(PathSegment::Member(name));
        } else if state.eat_separator(Separator::LBracket) {
            let index = parse_expr(state)?;
            state.expect_separator(Separator::RBracket)?;
            segments.push(PathSegment::Index(Box::new(index)));
        } else {
            break;
        }
    }
    Ok(Expr::RValue(RValuePath {
        head,
        segments,
        span: start,
    }))
}

fn parse_call_args(state: &mut ParseState) -> ParseResult<Vec<Expr>> {
    let mut args = Vec::new();
    while !matches!(&state.peek().kind, TokenKind::Separator(Separator::RParen)) {
        args.push(parse_expr(state)?);
        if !state.eat_operator(Operator::Comma) {
            break;
        }
    }
    state.expect_separator(Separator::RParen)?;
    Ok(args)
}

/// Disambiguates `sizeof(Type)` from `sizeof(expr)` with a checkpointed
/// attempt at a type reference first, mirroring the teacher's
/// `get_index`/`set_index` backtracking idiom.
fn parse_operand(state: &mut ParseState) -> ParseResult<Operand> {
    state.expect_separator(Separator::LParen)?;
    let checkpoint = state.get_index();
    if let Ok(ty) = parse_type_ref(state) {
        if matches!(&state.peek().kind, TokenKind::Separator(Separator::RParen)) {
            state.next();
            return Ok(Operand::Type(ty));
        }
    }
    state.set_index(checkpoint);
    let expr = parse_expr(state)?;
    state.expect_separator(Separator::RParen)?;
    Ok(Operand::Expr(Box::new(expr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::source::Source;

    fn parse_src(src: &str) -> ParseResult<Program> {
        let source = Source::new("test", src);
        let tokens = Lexer::new(&source).lex().unwrap();
        parse(tokens)
    }

    #[test]
    fn member_access_on_a_path_parses() {
        parse_src("u8 y = x.field;").unwrap();
    }

    #[test]
    fn member_access_on_a_call_result_is_a_parse_error() {
        let err = parse_src("u8 y = foo().field;").unwrap_err();
        assert!(err.message.contains("identifier path"));
    }

    #[test]
    fn indexing_a_call_result_is_a_parse_error() {
        let err = parse_src("u8 y = foo()[0];").unwrap_err();
        assert!(err.message.contains("identifier path"));
    }
}
