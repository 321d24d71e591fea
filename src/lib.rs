pub mod ast;
pub mod builtins;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod value;

pub use builtins::{FunctionMeta, ModuleRegistry};
pub use evaluator::{Interpreter, RuntimeError};
pub use lexer::{LexError, Token, tokenize};
pub use parser::{ParseError, Parser, parse_str};
pub use source::Span;
pub use value::Value;

use std::io::Write;
use thiserror::Error;

/// Any failure while running KL source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("LexError: {0}")]
    Lex(LexError),
    #[error("ParseError: {0}")]
    Parse(ParseError),
    #[error("RuntimeError: {0}")]
    Runtime(#[from] RuntimeError),
}

// Lexer failures surface through the parser; report them as what they are.
impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Lex(lex) => Error::Lex(lex),
            other => Error::Parse(other),
        }
    }
}

impl From<LexError> for Error {
    fn from(err: LexError) -> Self {
        Error::Lex(err)
    }
}

/// Parses `source` and runs it on `interp`. Nothing runs if parsing fails.
pub fn run_source<W: Write>(interp: &mut Interpreter<W>, source: &str) -> Result<(), Error> {
    let program = parse_str(source)?;
    interp.execute(&program)?;
    Ok(())
}
