//! Token stream -> token stream: `#include`, `#define`/`#undef`,
//! `#ifdef`/`#ifndef`/`#endif` (§4.2).

mod error;

pub use error::{PreprocessError, PreprocessErrorKind};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::lexer::{Lexer, Token, TokenKind};
use crate::source::{Source, SourceId, Span};

pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// A (line-span) region that a false `#ifdef`/`#ifndef` branch cut out.
/// Recorded, not dropped, so the highlighter can grey it out and the parser
/// can skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcludedRange {
    pub source: SourceId,
    pub start_line: usize,
    pub end_line: usize,
}

pub struct Preprocessed {
    pub tokens: Vec<Token>,
    pub excluded_ranges: Vec<ExcludedRange>,
    pub imported_namespaces: Vec<String>,
}

type Reader = Box<dyn Fn(&Path) -> Option<String>>;

pub struct Preprocessor {
    include_paths: Vec<PathBuf>,
    reader: Reader,
    next_source_id: usize,
    defines: HashSet<String>,
    visiting: Vec<PathBuf>,
    excluded_ranges: Vec<ExcludedRange>,
    imported_namespaces: Vec<String>,
}

impl Preprocessor {
    pub fn new(include_paths: &[PathBuf]) -> Self {
        Self::with_reader(
            include_paths,
            Box::new(|path| std::fs::read_to_string(path).ok()),
        )
    }

    /// Inject a custom file reader (used by tests so `#include` does not
    /// touch the real filesystem).
    pub fn with_reader(include_paths: &[PathBuf], reader: Reader) -> Self {
        let mut defines = HashSet::new();
        defines.insert("__PATHEX__".to_string());

        Self {
            include_paths: include_paths.to_vec(),
            reader,
            next_source_id: 1,
            defines,
            visiting: Vec::new(),
            excluded_ranges: Vec::new(),
            imported_namespaces: Vec::new(),
        }
    }

    pub fn run(mut self, tokens: Vec<Token>) -> PreprocessResult<Preprocessed> {
        let tokens = self.process(tokens)?;
        Ok(Preprocessed {
            tokens,
            excluded_ranges: self.excluded_ranges,
            imported_namespaces: self.imported_namespaces,
        })
    }

    /// A stack entry for one open `#ifdef`/`#ifndef`: whether the branch is
    /// currently taken, and where (for excluded-range bookkeeping) it began.
    fn process(&mut self, tokens: Vec<Token>) -> PreprocessResult<Vec<Token>> {
        let mut out = Vec::new();
        let mut branch_stack: Vec<bool> = Vec::new();
        let mut exclusion_start: Option<usize> = None;

        let active = |stack: &[bool]| stack.iter().all(|b| *b);

        for token in tokens {
            match &token.kind {
                TokenKind::Directive(text) => {
                    self.handle_directive(
                        text,
                        token.span,
                        &mut branch_stack,
                        &mut exclusion_start,
                        &mut out,
                    )?;
                }
                _ => {
                    if active(&branch_stack) {
                        out.push(token);
                    }
                    // else: token falls inside a false `#ifdef`/`#ifndef`
                    // branch. Its line is already covered by the
                    // exclusion range recorded in `handle_directive`;
                    // drop it here so the parser never sees it.
                }
            }
        }

        if !branch_stack.is_empty() {
            return Err(PreprocessError::new(
                PreprocessErrorKind::UnterminatedConditional,
                Span::synthetic(),
            ));
        }

        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_directive(
        &mut self,
        text: &str,
        span: Span,
        branch_stack: &mut Vec<bool>,
        exclusion_start: &mut Option<usize>,
        out: &mut Vec<Token>,
    ) -> PreprocessResult<()> {
        let active_before = branch_stack.iter().all(|b| *b);
        let mut parts = text.splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match keyword {
            "include" => {
                if !active_before {
                    return Ok(());
                }
                let path = rest.trim_matches(|c| c == '"' || c == '<' || c == '>');
                let included = self.load_include(path, span)?;
                out.extend(included);
            }
            "define" => {
                if active_before {
                    self.defines.insert(rest.to_string());
                }
            }
            "undef" => {
                if active_before {
                    self.defines.remove(rest);
                }
            }
            "ifdef" => {
                let taken = self.defines.contains(rest);
                branch_stack.push(taken);
                if !branch_stack.iter().all(|b| *b) && exclusion_start.is_none() {
                    *exclusion_start = Some(span.line);
                }
            }
            "ifndef" => {
                let taken = !self.defines.contains(rest);
                branch_stack.push(taken);
                if !branch_stack.iter().all(|b| *b) && exclusion_start.is_none() {
                    *exclusion_start = Some(span.line);
                }
            }
            "endif" => {
                if branch_stack.pop().is_none() {
                    return Err(PreprocessError::new(
                        PreprocessErrorKind::UnmatchedEndif,
                        span,
                    ));
                }
                if branch_stack.iter().all(|b| *b) {
                    if let Some(start) = exclusion_start.take() {
                        self.excluded_ranges.push(ExcludedRange {
                            source: span.source,
                            start_line: start,
                            end_line: span.line,
                        });
                    }
                }
            }
            other => {
                log::debug!("ignoring unknown preprocessor directive '#{other}'");
            }
        }

        Ok(())
    }

    fn load_include(&mut self, path: &str, span: Span) -> PreprocessResult<Vec<Token>> {
        let resolved = self.resolve_include(path).ok_or_else(|| {
            PreprocessError::new(PreprocessErrorKind::IncludeNotFound(path.to_string()), span)
        })?;

        if self.visiting.contains(&resolved) {
            return Err(PreprocessError::new(
                PreprocessErrorKind::IncludeCycle(path.to_string()),
                span,
            ));
        }

        let text = (self.reader)(&resolved).ok_or_else(|| {
            PreprocessError::new(PreprocessErrorKind::IncludeNotFound(path.to_string()), span)
        })?;

        let source_id = SourceId(self.next_source_id);
        self.next_source_id += 1;
        let source = Source::with_id(resolved.to_string_lossy(), text, source_id);

        self.visiting.push(resolved.clone());
        let tokens = Lexer::new(&source)
            .lex()
            .map_err(|_| PreprocessError::new(PreprocessErrorKind::IncludeNotFound(path.to_string()), span))?;
        self.record_namespaces(&tokens);
        let tokens = self.process(tokens)?;
        self.visiting.pop();

        // drop the included file's own EndOfProgram marker; only the
        // top-level stream needs one
        Ok(tokens
            .into_iter()
            .filter(|t| !t.is_eof())
            .collect())
    }

    fn record_namespaces(&mut self, tokens: &[Token]) {
        use crate::lexer::{Keyword, Operator};
        for window in tokens.windows(2) {
            if let [first, second] = window {
                if matches!(first.kind, TokenKind::Keyword(Keyword::Namespace)) {
                    if let Some(name) = second.as_identifier() {
                        if !self.imported_namespaces.iter().any(|n| n == name) {
                            self.imported_namespaces.push(name.to_string());
                        }
                    }
                }
                let _ = Operator::Dot; // keep import for future chained-namespace tracking
            }
        }
    }

    fn resolve_include(&self, path: &str) -> Option<PathBuf> {
        for base in &self.include_paths {
            let candidate = base.join(path);
            if (self.reader)(&candidate).is_some() {
                return Some(candidate);
            }
        }
        let direct = PathBuf::from(path);
        if (self.reader)(&direct).is_some() {
            return Some(direct);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;

    fn preprocess_str(src: &str, reader: Reader) -> Preprocessed {
        let source = Source::new("main", src);
        let tokens = Lexer::new(&source).lex().unwrap();
        Preprocessor::with_reader(&[], reader).run(tokens).unwrap()
    }

    #[test]
    fn define_and_ifdef() {
        let result = preprocess_str(
            "#define FOO\n#ifdef FOO\nu8 x;\n#endif\n#ifndef FOO\nu8 y;\n#endif\n",
            Box::new(|_| None),
        );
        let idents: Vec<_> = result
            .tokens
            .iter()
            .filter_map(|t| t.as_identifier())
            .collect();
        assert_eq!(idents, vec!["x"]);
        assert_eq!(result.excluded_ranges.len(), 1);
    }

    #[test]
    fn unmatched_endif_is_an_error() {
        let source = Source::new("main", "#endif\n");
        let tokens = Lexer::new(&source).lex().unwrap();
        let err = Preprocessor::with_reader(&[], Box::new(|_| None))
            .run(tokens)
            .unwrap_err();
        assert_eq!(err.kind, PreprocessErrorKind::UnmatchedEndif);
    }

    #[test]
    fn unterminated_conditional_is_an_error() {
        let source = Source::new("main", "#ifdef FOO\nu8 x;\n");
        let tokens = Lexer::new(&source).lex().unwrap();
        let err = Preprocessor::with_reader(&[], Box::new(|_| None))
            .run(tokens)
            .unwrap_err();
        assert_eq!(err.kind, PreprocessErrorKind::UnterminatedConditional);
    }

    #[test]
    fn include_splices_tokens() {
        let result = preprocess_str(
            "#include \"inner.pat\"\nu8 y;\n",
            Box::new(|p| {
                if p.to_string_lossy().ends_with("inner.pat") {
                    Some("u8 x;\n".to_string())
                } else {
                    None
                }
            }),
        );
        let idents: Vec<_> = result
            .tokens
            .iter()
            .filter_map(|t| t.as_identifier())
            .collect();
        assert_eq!(idents, vec!["x", "y"]);
    }

    #[test]
    fn include_cycle_is_an_error() {
        let reader: Reader = Box::new(|p| {
            let name = p.to_string_lossy().to_string();
            if name.ends_with("a.pat") {
                Some("#include \"b.pat\"\n".to_string())
            } else if name.ends_with("b.pat") {
                Some("#include \"a.pat\"\n".to_string())
            } else {
                None
            }
        });
        let source = Source::new("main", "#include \"a.pat\"\n");
        let tokens = Lexer::new(&source).lex().unwrap();
        let err = Preprocessor::with_reader(&[], reader)
            .run(tokens)
            .unwrap_err();
        assert!(matches!(err.kind, PreprocessErrorKind::IncludeCycle(_)));
    }
}
