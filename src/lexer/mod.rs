//! Byte stream -> token stream (§4.1).

mod error;
mod token;

pub use error::{LexError, LexErrorKind};
pub use token::*;

use std::iter::Peekable;
use std::str::Chars;

use crate::source::{Source, Span};

pub type LexResult<T> = Result<T, LexError>;

/// Turns source text into a finite, ordered token stream ending in
/// `EndOfProgram`. Idempotent and deterministic: re-lexing identical input
/// yields identical tokens, including byte-exact source locations.
pub struct Lexer<'a> {
    source: &'a Source,
    chars: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a Source) -> Self {
        Self {
            source,
            chars: source.text.chars().peekable(),
            line: 1,
            col: 1,
            tokens: Vec::new(),
        }
    }

    fn span(&self, start: (usize, usize), length: usize) -> Span {
        Span::new(self.source.id, start.0, start.1, length)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek2(&mut self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn here(&self) -> (usize, usize) {
        (self.line, self.col)
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            self.eat_whitespace();

            let Some(c) = self.peek() else { break };
            let start = self.here();

            match c {
                '/' if self.peek2() == Some('/') || self.peek2() == Some('*') => {
                    self.lex_comment(start)?
                }
                '"' => self.lex_string(start)?,
                '\'' => self.lex_char(start)?,
                '#' => self.lex_directive(start)?,
                'a'..='z' | 'A'..='Z' | '_' => self.lex_identifier(start)?,
                '0'..='9' => self.lex_number(start)?,
                _ => self.lex_operator_or_separator(start)?,
            }
        }

        let start = self.here();
        self.tokens
            .push(Token::new(TokenKind::EndOfProgram, self.span(start, 0)));
        Ok(self.tokens)
    }

    fn eat_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn lex_comment(&mut self, start: (usize, usize)) -> LexResult<()> {
        self.bump(); // '/'
        let second = self.bump().unwrap(); // '/' or '*'

        if second == '/' {
            let mut doc = None;
            if self.peek() == Some('/') {
                self.bump();
                doc = Some(DocFlavor::Line);
            } else if self.peek() == Some('!') {
                self.bump();
                doc = Some(DocFlavor::Global);
            }

            let mut text = String::new();
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                text.push(c);
                self.bump();
            }

            self.tokens.push(Token::new(
                TokenKind::Comment {
                    text,
                    single_line: true,
                    doc,
                },
                self.span(start, self.col.saturating_sub(start.1)),
            ));
            return Ok(());
        }

        // block comment
        let mut doc = None;
        if self.peek() == Some('*') && self.peek2() != Some('/') {
            self.bump();
            doc = Some(DocFlavor::Block);
        } else if self.peek() == Some('!') {
            self.bump();
            doc = Some(DocFlavor::GlobalBlock);
        }

        let mut text = String::new();
        loop {
            match (self.peek(), self.peek2()) {
                (Some('*'), Some('/')) => {
                    self.bump();
                    self.bump();
                    break;
                }
                (Some(c), _) => {
                    text.push(c);
                    self.bump();
                }
                (None, _) => {
                    return Err(LexError::new(
                        LexErrorKind::UnterminatedComment,
                        self.span(start, 2),
                    ))
                }
            }
        }

        self.tokens.push(Token::new(
            TokenKind::Comment {
                text,
                single_line: false,
                doc,
            },
            self.span(start, 2),
        ));
        Ok(())
    }

    fn read_escape(&mut self, start: (usize, usize)) -> LexResult<u32> {
        let c = self
            .bump()
            .ok_or_else(|| LexError::new(LexErrorKind::UnterminatedString, self.span(start, 1)))?;
        Ok(match c {
            '\\' => '\\' as u32,
            '\'' => '\'' as u32,
            '"' => '"' as u32,
            '0' => 0,
            'a' => 0x07,
            'b' => 0x08,
            'f' => 0x0C,
            'n' => b'\n' as u32,
            'r' => b'\r' as u32,
            't' => b'\t' as u32,
            'x' => {
                let mut hex = String::new();
                for _ in 0..2 {
                    match self.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(h);
                            self.bump();
                        }
                        _ => {
                            return Err(LexError::new(
                                LexErrorKind::InvalidEscape(format!("x{hex}")),
                                self.span(start, hex.len() + 2),
                            ))
                        }
                    }
                }
                u32::from_str_radix(&hex, 16).unwrap()
            }
            'u' => {
                let mut hex = String::new();
                for _ in 0..4 {
                    match self.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(h);
                            self.bump();
                        }
                        _ => {
                            return Err(LexError::new(
                                LexErrorKind::InvalidEscape(format!("u{hex}")),
                                self.span(start, hex.len() + 2),
                            ))
                        }
                    }
                }
                return Ok(u32::from_str_radix(&hex, 16).unwrap());
            }
            other => {
                return Err(LexError::new(
                    LexErrorKind::InvalidEscape(other.to_string()),
                    self.span(start, 2),
                ))
            }
        })
    }

    fn lex_string(&mut self, start: (usize, usize)) -> LexResult<()> {
        self.bump(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\n') | None => {
                    return Err(LexError::new(
                        LexErrorKind::UnterminatedString,
                        self.span(start, 1),
                    ))
                }
                Some('\\') => {
                    let esc_start = self.here();
                    self.bump();
                    let code = self.read_escape(esc_start)?;
                    if let Some(ch) = char::from_u32(code) {
                        value.push(ch);
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }

        self.tokens.push(Token::new(
            TokenKind::String(value),
            self.span(start, self.col.saturating_sub(start.1)),
        ));
        Ok(())
    }

    fn lex_char(&mut self, start: (usize, usize)) -> LexResult<()> {
        self.bump(); // opening quote
        let mut is_char16 = false;

        let value = match self.peek() {
            Some('\\') => {
                let esc_start = self.here();
                self.bump();
                let escaped_u = matches!(self.peek(), Some('u'));
                let code = self.read_escape(esc_start)?;
                is_char16 = escaped_u;
                code
            }
            Some(c) => {
                self.bump();
                c as u32
            }
            None => {
                return Err(LexError::new(
                    LexErrorKind::UnterminatedChar,
                    self.span(start, 1),
                ))
            }
        };

        match self.peek() {
            Some('\'') => {
                self.bump();
            }
            _ => {
                return Err(LexError::new(
                    LexErrorKind::UnterminatedChar,
                    self.span(start, self.col.saturating_sub(start.1)),
                ))
            }
        }

        self.tokens.push(Token::new(
            TokenKind::Char { value, is_char16 },
            self.span(start, self.col.saturating_sub(start.1)),
        ));
        Ok(())
    }

    fn lex_directive(&mut self, start: (usize, usize)) -> LexResult<()> {
        self.bump(); // '#'
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
        }
        self.tokens.push(Token::new(
            TokenKind::Directive(text.trim().to_string()),
            self.span(start, self.col.saturating_sub(start.1)),
        ));
        Ok(())
    }

    fn lex_identifier(&mut self, start: (usize, usize)) -> LexResult<()> {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            text.push(self.bump().unwrap());
        }

        let span = self.span(start, text.len());
        let kind = if let Some(keyword) = Keyword::from_str(&text) {
            TokenKind::Keyword(keyword)
        } else if let Some(value_type) = ValueType::from_str(&text) {
            TokenKind::ValueType(value_type)
        } else {
            TokenKind::Identifier {
                text,
                id_kind: IdKind::Unknown,
            }
        };

        self.tokens.push(Token::new(kind, span));
        Ok(())
    }

    fn lex_number(&mut self, start: (usize, usize)) -> LexResult<()> {
        let mut text = String::new();

        let radix = if self.peek() == Some('0') {
            match self.peek2() {
                Some('x') | Some('X') => Some(16),
                Some('b') | Some('B') => Some(2),
                Some('o') | Some('O') => Some(8),
                _ => None,
            }
        } else {
            None
        };

        if let Some(radix) = radix {
            text.push(self.bump().unwrap()); // '0'
            text.push(self.bump().unwrap()); // prefix letter
            let digit_start = text.len();
            while matches!(self.peek(), Some(c) if c.is_digit(radix) || c == '_') {
                let c = self.bump().unwrap();
                if c != '_' {
                    text.push(c);
                }
            }
            let digits = &text[digit_start..];
            let value = u128::from_str_radix(digits, radix).map_err(|_| {
                LexError::new(
                    LexErrorKind::NumericOutOfRange(text.clone()),
                    self.span(start, self.col.saturating_sub(start.1)),
                )
            })?;
            self.eat_integer_suffix();
            self.tokens.push(Token::new(
                TokenKind::Integer(value),
                self.span(start, self.col.saturating_sub(start.1)),
            ));
            return Ok(());
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }

        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            text.push(self.bump().unwrap());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push(self.bump().unwrap());
            if matches!(self.peek(), Some('+') | Some('-')) {
                text.push(self.bump().unwrap());
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
        }

        if is_float {
            let mut is_f32 = false;
            if matches!(self.peek(), Some('f') | Some('F')) {
                is_f32 = true;
                self.bump();
            } else if matches!(self.peek(), Some('d') | Some('D')) {
                self.bump();
            }

            let value: f64 = text.parse().map_err(|_| {
                LexError::new(
                    LexErrorKind::NumericOutOfRange(text.clone()),
                    self.span(start, self.col.saturating_sub(start.1)),
                )
            })?;
            let value = if is_f32 { value as f32 as f64 } else { value };

            self.tokens.push(Token::new(
                TokenKind::Float(value),
                self.span(start, self.col.saturating_sub(start.1)),
            ));
        } else {
            let value: u128 = text.parse().map_err(|_| {
                LexError::new(
                    LexErrorKind::NumericOutOfRange(text.clone()),
                    self.span(start, self.col.saturating_sub(start.1)),
                )
            })?;
            self.eat_integer_suffix();
            self.tokens.push(Token::new(
                TokenKind::Integer(value),
                self.span(start, self.col.saturating_sub(start.1)),
            ));
        }

        Ok(())
    }

    fn eat_integer_suffix(&mut self) {
        while matches!(self.peek(), Some('u') | Some('U') | Some('l') | Some('L')) {
            self.bump();
        }
    }

    fn lex_operator_or_separator(&mut self, start: (usize, usize)) -> LexResult<()> {
        if let Some(sep) = match self.peek() {
            Some('(') => Some(Separator::LParen),
            Some(')') => Some(Separator::RParen),
            Some('{') => Some(Separator::LBrace),
            Some('}') => Some(Separator::RBrace),
            Some('[') => Some(Separator::LBracket),
            Some(']') => Some(Separator::RBracket),
            _ => None,
        } {
            self.bump();
            self.tokens
                .push(Token::new(TokenKind::Separator(sep), self.span(start, 1)));
            return Ok(());
        }

        // longest-match against the operator table
        let mut rest = self.chars.clone();
        let window: String = std::iter::from_fn(|| rest.next()).take(3).collect();

        for (text, op) in Operator::TABLE {
            if window.starts_with(text) {
                for _ in 0..text.chars().count() {
                    self.bump();
                }
                self.tokens
                    .push(Token::new(TokenKind::Operator(*op), self.span(start, text.len())));
                return Ok(());
            }
        }

        let c = self.peek().unwrap();
        Err(LexError::new(
            LexErrorKind::InvalidCharacter(c),
            self.span(start, 1),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenKind> {
        let source = Source::new("test", src);
        Lexer::new(&source)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_placement() {
        let tokens = lex("u32 x @ 0x00;");
        assert_eq!(
            tokens,
            vec![
                TokenKind::ValueType(ValueType::U32),
                TokenKind::Identifier {
                    text: "x".into(),
                    id_kind: IdKind::Unknown
                },
                TokenKind::Operator(Operator::At),
                TokenKind::Integer(0),
                TokenKind::Operator(Operator::Semicolon),
                TokenKind::EndOfProgram,
            ]
        );
    }

    #[test]
    fn lexes_hex_bin_oct() {
        let tokens = lex("0xFF 0b101 0o17");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Integer(0xFF),
                TokenKind::Integer(0b101),
                TokenKind::Integer(0o17),
                TokenKind::EndOfProgram,
            ]
        );
    }

    #[test]
    fn lexes_max_128_bit_hex_literal() {
        // u128::MAX: valid per spec.md §3's 128-bit-wide literal carrier,
        // even though it doesn't fit in an `i128`.
        let tokens = lex("0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF");
        assert_eq!(tokens, vec![TokenKind::Integer(u128::MAX), TokenKind::EndOfProgram]);
    }

    #[test]
    fn lexes_float_suffix() {
        let tokens = lex("1.5f 2.0");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Float(1.5),
                TokenKind::Float(2.0),
                TokenKind::EndOfProgram
            ]
        );
    }

    #[test]
    fn lexes_doc_comments() {
        let tokens = lex("/// hi\n//! global\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Comment {
                    text: " hi".into(),
                    single_line: true,
                    doc: Some(DocFlavor::Line)
                },
                TokenKind::Comment {
                    text: " global".into(),
                    single_line: true,
                    doc: Some(DocFlavor::Global)
                },
                TokenKind::EndOfProgram,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let source = Source::new("test", "\"abc");
        let err = Lexer::new(&source).lex().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn invalid_character_is_an_error() {
        let source = Source::new("test", "u32 x = `;");
        let err = Lexer::new(&source).lex().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidCharacter('`'));
    }

    #[test]
    fn lexing_is_deterministic() {
        let source = Source::new("test", "struct P { u16 a; u16 b; };");
        let a = Lexer::new(&source).lex().unwrap();
        let b = Lexer::new(&source).lex().unwrap();
        assert_eq!(a, b);
    }
}
