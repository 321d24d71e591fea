use crate::Error;
use crate::environment::EnvError;
use crate::evaluator::RuntimeError;
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::source::Span;
use ariadne::{Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

// ariadne cannot point at an empty range; widen it to one character.
fn label_range(span: Span) -> Range<usize> {
    if span.start == span.end {
        span.start..span.start + 1
    } else {
        span.to_range()
    }
}

impl Error {
    pub fn span(&self) -> Span {
        match self {
            Error::Lex(err) => err.span,
            Error::Parse(err) => err.span(),
            Error::Runtime(err) => err.span(),
        }
    }

    /// Title and label text of the report.
    fn describe(&self) -> (String, String) {
        match self {
            Error::Lex(err) => lex_message(err),
            Error::Parse(err) => parse_message(err),
            Error::Runtime(err) => runtime_message(err),
        }
    }

    /// Writes the error to standard error as a report over `input`.
    /// `file` names the source in the report header.
    pub fn pretty_print(&self, file: &str, input: &str) -> io::Result<()> {
        let range = label_range(self.span());
        let (title, label) = self.describe();
        Report::build(ReportKind::Error, (file, range.clone()))
            .with_message(title)
            .with_label(Label::new((file, range)).with_message(label))
            .finish()
            .eprint((file, Source::from(input)))
    }
}

fn lex_message(err: &LexError) -> (String, String) {
    (format!("LexError: {}", err.error), "while reading this".to_string())
}

fn parse_message(err: &ParseError) -> (String, String) {
    match err {
        ParseError::Lex(lex_err) => lex_message(lex_err),
        ParseError::UnexpectedToken {
            found, expected, ..
        } => (
            format!("ParseError: unexpected '{}'", found),
            format!("expected {} here", expected),
        ),
        ParseError::PostfixTarget { .. } => (
            "ParseError: bad postfix target".to_string(),
            "'++' and '--' only apply to a variable".to_string(),
        ),
    }
}

fn runtime_message(err: &RuntimeError) -> (String, String) {
    let label = match err {
        RuntimeError::Env(EnvError::UndefinedVariable(..)) => {
            "no variable of this name in scope".to_string()
        }
        RuntimeError::UndefinedFunction { .. } => {
            "not a user function nor a built-in of an imported module".to_string()
        }
        RuntimeError::ArityMismatch { expected, .. } => {
            format!("this call needs {} arguments", expected)
        }
        RuntimeError::TypeMismatch { found, .. } => format!("this is a {}", found),
        RuntimeError::DivisionByZero { .. } | RuntimeError::ModuloByZero { .. } => {
            "the right operand is zero".to_string()
        }
        RuntimeError::ZeroToZeroPower { .. } => "both operands are zero".to_string(),
        RuntimeError::BadBuiltinSignature { reason, .. } => reason.clone(),
        RuntimeError::Domain { message, .. } => format!("argument out of domain: {}", message),
        RuntimeError::UnknownModule { .. } => "no module of this name".to_string(),
        RuntimeError::ReadOnlyConstant { .. } => "constants cannot be assigned".to_string(),
        RuntimeError::ReturnOutsideFunction { .. } => "not inside a function body".to_string(),
        RuntimeError::RecursionLimit { .. } => "too deeply nested".to_string(),
        RuntimeError::Output { .. } => "while printing this".to_string(),
    };
    (format!("RuntimeError: {}", err), label)
}
