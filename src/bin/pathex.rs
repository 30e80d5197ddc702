//! # Pathex
//!
//! This binary is the command-line front-end of pathex. It runs a
//! pattern-language program through the full pipeline — lex, preprocess,
//! parse, validate and, if a data file is given, evaluate — against a byte
//! source and prints the resulting pattern tree.

use std::fs;
use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, ValueEnum};
use log::{error, info};

use pathex::evaluator::{Evaluator, SliceProvider};
use pathex::lexer::Lexer;
use pathex::pattern::Endian;
use pathex::preprocessor::Preprocessor;
use pathex::source::Source;
use pathex::validator::Validator;
use pathex::{parser, Pattern};

/// Inspect binary data through a pattern-language program.
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the pattern-language program to run.
    file: PathBuf,

    /// Binary file to evaluate the program against. Without it, only the
    /// lex/preprocess/parse/validate stages run.
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Address of `data`'s first byte, decimal or `0x`-prefixed hex.
    #[arg(long, default_value = "0", value_parser = parse_address)]
    base: u64,

    /// Default endianness for reads with no explicit `be`/`le` attribute.
    #[arg(value_enum, long, default_value_t = EndianArg::Little)]
    endian: EndianArg,

    /// Extra `#include` search directory; may be repeated.
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Maximum user-function call recursion depth.
    #[arg(long, default_value_t = 256)]
    max_call_depth: usize,

    /// Maximum number of patterns the evaluator may create.
    #[arg(long, default_value_t = 1_000_000)]
    max_patterns: usize,

    /// Dump the lexed token stream as JSON and exit.
    #[arg(long)]
    dump_tokens: bool,

    /// Dump the parsed syntax tree as JSON and exit.
    #[arg(long)]
    dump_ast: bool,

    /// Dump the evaluated pattern tree as JSON instead of the default
    /// human-readable rendering.
    #[arg(long)]
    dump_tree: bool,

    /// Specify the log level of pathex.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,
}

/// `clap`-facing mirror of [`pathex::pattern::Endian`]; kept separate so the
/// pattern tree itself never depends on `clap`.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum EndianArg {
    Little,
    Big,
}

impl From<EndianArg> for Endian {
    fn from(value: EndianArg) -> Self {
        match value {
            EndianArg::Little => Endian::Little,
            EndianArg::Big => Endian::Big,
        }
    }
}

/// Enum for specifying the log level of pathex.
#[derive(ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    /// The default log level. Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// Also log warnings, e.g. a truncated read.
    #[value(alias("1"))]
    Warn,

    /// Also log information about the stage the pipeline is in.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the evaluator.
    #[value(alias("3"))]
    Debug,

    /// Log extra information, including per-statement evaluation traces.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn parse_address(text: &str) -> Result<u64, String> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        text.parse::<u64>().map_err(|e| e.to_string())
    }
}

fn main() {
    let args = Cli::parse();

    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let program_text = match fs::read_to_string(&args.file) {
        Ok(text) => text,
        Err(e) => {
            error!("could not read '{}': {e}", args.file.display());
            exit(1);
        }
    };
    let source_name = args.file.to_string_lossy().into_owned();
    let source = Source::new(source_name, program_text);

    info!("lexing {}", args.file.display());
    let tokens = match Lexer::new(&source).lex() {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{}", e.render(&source));
            exit(1);
        }
    };

    if args.dump_tokens {
        print_json(&tokens);
        return;
    }

    info!("preprocessing");
    let preprocessed = match Preprocessor::new(&args.include).run(tokens) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    info!("parsing");
    let program = match parser::parse(preprocessed.tokens) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e.render(&source));
            exit(1);
        }
    };

    if args.dump_ast {
        print_json(&program);
        return;
    }

    info!("validating");
    let mut validator = Validator::new();
    let validation_errors = validator.validate_all(&program);
    if !validation_errors.is_empty() {
        for err in &validation_errors {
            eprintln!("{}", err.render(&source));
        }
        exit(1);
    }

    let Some(data_path) = &args.data else {
        info!("no --data file given; stopping after validation");
        return;
    };

    let bytes = match fs::read(data_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("could not read '{}': {e}", data_path.display());
            exit(1);
        }
    };

    info!("evaluating against {} ({} bytes)", data_path.display(), bytes.len());
    let mut provider = SliceProvider::with_base(bytes, args.base);
    let mut evaluator = Evaluator::with_limits(&mut provider, args.max_call_depth, args.max_patterns);
    evaluator.set_default_endian(args.endian.into());

    let patterns = match evaluator.evaluate(&program) {
        Ok(patterns) => patterns,
        Err(e) => {
            eprintln!("{}", e.render(&source));
            exit(1);
        }
    };

    if args.dump_tree {
        print_json(&patterns);
    } else {
        print_patterns(&patterns, 0);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            error!("could not serialize output: {e}");
            exit(1);
        }
    }
}

/// Human-readable rendering used when no `--dump-*` flag is given: one line
/// per visible pattern, indented by nesting depth.
fn print_patterns(patterns: &[Pattern], depth: usize) {
    let indent = "  ".repeat(depth);
    for pattern in patterns {
        if pattern.hidden {
            continue;
        }
        let marker = if pattern.truncated { " (truncated)" } else { "" };
        println!(
            "{indent}{} {} @ 0x{:X} = {}{marker}",
            pattern.type_name,
            pattern.display_name(),
            pattern.offset,
            pattern.format(),
        );
        print_children(pattern, depth + 1);
    }
}

fn print_children(pattern: &Pattern, depth: usize) {
    use pathex::pattern::PatternKind::*;
    match &pattern.kind {
        Struct { members } | Union { members } => print_patterns(members, depth),
        DynamicArray { entries } => print_patterns(entries, depth),
        Bitfield { fields } => print_patterns(fields, depth),
        Pointer { pointee, .. } => print_patterns(std::slice::from_ref(pointee.as_ref()), depth),
        _ => {}
    }
}
