//! Token categories (§3 "Token").

use serde::Serialize;

use crate::source::Span;

/// Reserved words (§6 "Pattern-language surface").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Keyword {
    Using,
    Struct,
    Union,
    Enum,
    Bitfield,
    Namespace,
    Fn,
    Return,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    True,
    False,
    Null,
    This,
    Parent,
    In,
    Out,
    Import,
    Addressof,
    Sizeof,
    Typeof,
}

impl Keyword {
    pub fn from_str(s: &str) -> Option<Self> {
        use Keyword::*;
        Some(match s {
            "using" => Using,
            "struct" => Struct,
            "union" => Union,
            "enum" => Enum,
            "bitfield" => Bitfield,
            "namespace" => Namespace,
            "fn" => Fn,
            "return" => Return,
            "if" => If,
            "else" => Else,
            "while" => While,
            "for" => For,
            "break" => Break,
            "continue" => Continue,
            "true" => True,
            "false" => False,
            "null" => Null,
            "this" => This,
            "parent" => Parent,
            "in" => In,
            "out" => Out,
            "import" => Import,
            "addressof" => Addressof,
            "sizeof" => Sizeof,
            "typeof" => Typeof,
            _ => return None,
        })
    }
}

/// Built-in type names (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    U8,
    U16,
    U24,
    U32,
    U48,
    U64,
    U96,
    U128,
    S8,
    S16,
    S24,
    S32,
    S48,
    S64,
    S96,
    S128,
    Float,
    Double,
    Bool,
    Char,
    Char16,
    Padding,
    Auto,
    Str,
}

impl ValueType {
    pub fn from_str(s: &str) -> Option<Self> {
        use ValueType::*;
        Some(match s {
            "u8" => U8,
            "u16" => U16,
            "u24" => U24,
            "u32" => U32,
            "u48" => U48,
            "u64" => U64,
            "u96" => U96,
            "u128" => U128,
            "s8" => S8,
            "s16" => S16,
            "s24" => S24,
            "s32" => S32,
            "s48" => S48,
            "s64" => S64,
            "s96" => S96,
            "s128" => S128,
            "float" => Float,
            "double" => Double,
            "bool" => Bool,
            "char" => Char,
            "char16" => Char16,
            "padding" => Padding,
            "auto" => Auto,
            "str" => Str,
            _ => return None,
        })
    }

    /// Fixed byte width, or `None` for `auto`/`str` whose width is
    /// context-dependent.
    pub fn byte_width(self) -> Option<u64> {
        use ValueType::*;
        Some(match self {
            U8 | S8 | Char | Bool => 1,
            U16 | S16 | Char16 => 2,
            U24 | S24 => 3,
            U32 | S32 | Float => 4,
            U48 | S48 => 6,
            U64 | S64 | Double => 8,
            U96 | S96 => 12,
            U128 | S128 => 16,
            Padding | Auto | Str => return None,
        })
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ValueType::S8
                | ValueType::S16
                | ValueType::S24
                | ValueType::S32
                | ValueType::S48
                | ValueType::S64
                | ValueType::S96
                | ValueType::S128
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ValueType::Float | ValueType::Double)
    }
}

/// Binary/unary operators, including compound assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Tilde,
    Not,
    And,
    Or,
    Xor,
    AndAnd,
    OrOr,
    XorXor,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Assign,
    ScopeRes,
    Dot,
    Comma,
    Semicolon,
    Question,
    Colon,
    Dollar,
    At,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AndEq,
    OrEq,
    XorEq,
    ShlEq,
    ShrEq,
}

impl Operator {
    /// Longest-match table, tried in order so multi-character operators win
    /// over their single-character prefixes.
    pub const TABLE: &'static [(&'static str, Operator)] = &[
        ("<<=", Operator::ShlEq),
        (">>=", Operator::ShrEq),
        ("::", Operator::ScopeRes),
        ("&&", Operator::AndAnd),
        ("||", Operator::OrOr),
        ("^^", Operator::XorXor),
        ("==", Operator::Eq),
        ("!=", Operator::NotEq),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("<<", Operator::Shl),
        (">>", Operator::Shr),
        ("+=", Operator::PlusEq),
        ("-=", Operator::MinusEq),
        ("*=", Operator::StarEq),
        ("/=", Operator::SlashEq),
        ("%=", Operator::PercentEq),
        ("&=", Operator::AndEq),
        ("|=", Operator::OrEq),
        ("^=", Operator::XorEq),
        ("+", Operator::Plus),
        ("-", Operator::Minus),
        ("*", Operator::Star),
        ("/", Operator::Slash),
        ("%", Operator::Percent),
        ("~", Operator::Tilde),
        ("!", Operator::Not),
        ("&", Operator::And),
        ("|", Operator::Or),
        ("^", Operator::Xor),
        ("<", Operator::Lt),
        (">", Operator::Gt),
        ("=", Operator::Assign),
        (".", Operator::Dot),
        (",", Operator::Comma),
        (";", Operator::Semicolon),
        ("?", Operator::Question),
        (":", Operator::Colon),
        ("$", Operator::Dollar),
        ("@", Operator::At),
    ];
}

/// `(){}[]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Separator {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

/// Late-bound classification of an identifier token, written back by the
/// evaluator/highlighter once resolution has happened (§3 "Token").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum IdKind {
    #[default]
    Unknown,
    Function,
    Udt,
    NameSpace,
    Typedef,
    TemplateArgument,
    GlobalVariable,
    PlacedVariable,
    PatternVariable,
    LocalVariable,
    CalculatedPointer,
    View,
    FunctionVariable,
    FunctionParameter,
    Macro,
    Attribute,
    MemberUnknown,
    FunctionUnknown,
    ScopeResolutionUnknown,
}

/// Which doc-comment flavor a comment token is, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DocFlavor {
    Line,      // `///`
    Block,     // `/** */`
    Global,    // `//!`
    GlobalBlock, // `/*! */`
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    Keyword(Keyword),
    Operator(Operator),
    Separator(Separator),
    ValueType(ValueType),
    Integer(u128),
    Float(f64),
    String(String),
    /// `value` holds the code point; `is_char16` distinguishes `\uHHHH`
    /// escapes (which lex as `char16`) from plain char literals.
    Char { value: u32, is_char16: bool },
    Identifier { text: String, id_kind: IdKind },
    Comment { text: String, single_line: bool, doc: Option<DocFlavor> },
    Directive(String),
    EndOfProgram,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::EndOfProgram)
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn set_id_kind(&mut self, kind: IdKind) {
        if let TokenKind::Identifier { id_kind, .. } = &mut self.kind {
            *id_kind = kind;
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "{k:?}"),
            TokenKind::Operator(o) => write!(f, "{o:?}"),
            TokenKind::Separator(s) => write!(f, "{s:?}"),
            TokenKind::ValueType(v) => write!(f, "{v:?}"),
            TokenKind::Integer(v) => write!(f, "{v}"),
            TokenKind::Float(v) => write!(f, "{v}"),
            TokenKind::String(v) => write!(f, "{v:?}"),
            TokenKind::Char { value, .. } => write!(f, "'{value}'"),
            TokenKind::Identifier { text, .. } => write!(f, "{text}"),
            TokenKind::Comment { text, .. } => write!(f, "{text}"),
            TokenKind::Directive(text) => write!(f, "#{text}"),
            TokenKind::EndOfProgram => write!(f, "<eof>"),
        }
    }
}
