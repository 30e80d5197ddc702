//! `pathex` turns a pattern-language program and a byte source into a tree of
//! typed patterns, and classifies every source character for syntax
//! highlighting.
//!
//! Pipeline: [`lexer`] -> [`preprocessor`] -> [`parser`] -> [`validator`] ->
//! [`evaluator`] -> [`pattern`]. [`highlighter`] taps the lexer's token
//! stream and the evaluator's symbol tables to paint source text.

pub mod evaluator;
pub mod highlighter;
pub mod lexer;
pub mod parser;
pub mod pattern;
pub mod preprocessor;
pub mod source;
pub mod validator;
pub mod value;

pub use evaluator::{EvalError, Evaluator};
pub use pattern::Pattern;
pub use source::{Location, Source, SourceId, Span};
pub use value::Literal;

/// Run the whole pipeline over `program`, evaluating it against `provider`.
///
/// This is the single entry point views and the CLI should use; it performs
/// no recovery, mirroring the propagation policy in the specification:
/// any error aborts the run and no partial tree is produced.
pub fn run(
    program: &str,
    source_name: &str,
    include_paths: &[std::path::PathBuf],
    provider: &mut dyn evaluator::Provider,
) -> Result<Vec<Pattern>, Error> {
    let source = Source::new(source_name, program);

    let tokens = lexer::Lexer::new(&source).lex()?;
    let preprocessed = preprocessor::Preprocessor::new(include_paths).run(tokens)?;
    let ast = parser::parse(preprocessed.tokens)?;
    validator::Validator::new().validate(&ast)?;

    let mut evaluator = evaluator::Evaluator::new(provider);
    Ok(evaluator.evaluate(&ast)?)
}

/// The union of every error kind produced by the pipeline (§7 of the spec:
/// "Error taxonomy").
#[derive(Debug, Clone)]
pub enum Error {
    Lex(lexer::LexError),
    Preprocess(preprocessor::PreprocessError),
    Parse(parser::ParseError),
    Validate(validator::ValidateError),
    Eval(evaluator::EvalError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Lex(e) => write!(f, "{e}"),
            Error::Preprocess(e) => write!(f, "{e}"),
            Error::Parse(e) => write!(f, "{e}"),
            Error::Validate(e) => write!(f, "{e}"),
            Error::Eval(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<lexer::LexError> for Error {
    fn from(e: lexer::LexError) -> Self {
        Error::Lex(e)
    }
}

impl From<preprocessor::PreprocessError> for Error {
    fn from(e: preprocessor::PreprocessError) -> Self {
        Error::Preprocess(e)
    }
}

impl From<parser::ParseError> for Error {
    fn from(e: parser::ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<validator::ValidateError> for Error {
    fn from(e: validator::ValidateError) -> Self {
        Error::Validate(e)
    }
}

impl From<evaluator::EvalError> for Error {
    fn from(e: evaluator::EvalError) -> Self {
        Error::Eval(e)
    }
}
