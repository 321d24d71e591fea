use std::borrow::Cow;
use std::cell::RefCell;
use std::io::{self, Stdout};
use std::rc::Rc;

use kl::lexer::{KEYWORDS, TokenKind, tokenize};
use kl::{Error, Interpreter, parse_str};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_FILE: &str = "kl_history.txt";

type SharedInterpreter = Rc<RefCell<Interpreter<Stdout>>>;

struct KlCompleter {
    interp: SharedInterpreter,
}

impl rustyline::completion::Completer for KlCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last() {
                Some(token) if token.span.end == pos => match &token.kind {
                    TokenKind::Identifier(name) => name.clone(),
                    _ => return Ok((pos, vec![])),
                },
                _ => return Ok((pos, vec![])),
            },
            Err(_) => return Ok((pos, vec![])),
        };

        let mut candidates: Vec<String> = self
            .interp
            .borrow()
            .identifiers()
            .into_iter()
            .chain(KEYWORDS.iter().map(|k| k.to_string()))
            .filter(|id| id.starts_with(&prefix) && id.len() > prefix.len())
            .map(|id| id[prefix.len()..].to_string())
            .collect();
        candidates.sort();
        candidates.dedup();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct KlHelper {
    #[rustyline(Validator)]
    validator: KlValidator,
    #[rustyline(Highlighter)]
    highlighter: KlHighlighter,
    #[rustyline(Completer)]
    completer: KlCompleter,
}

fn is_pair(open: char, close: char) -> bool {
    matches!((open, close), ('(', ')') | ('{', '}'))
}

struct KlValidator;

impl Validator for KlValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut stack = Vec::new();
        let mut in_string = false;

        for (i, c) in ctx.input().chars().enumerate() {
            if in_string {
                in_string = c != '"';
                continue;
            }
            match c {
                '"' => in_string = true,
                '(' | '{' => stack.push(c),
                ')' | '}' => match stack.pop() {
                    Some(open) if is_pair(open, c) => {}
                    _ => {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched '{}' at position {}",
                            c, i
                        ))));
                    }
                },
                _ => {}
            }
        }

        // Keep reading while a string or a bracket is open
        if in_string || !stack.is_empty() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct KlHighlighter;

impl KlHighlighter {
    /// Index of the bracket matching the one just before the cursor.
    fn matching_bracket(chars: &[char], pos: usize) -> Option<(usize, usize)> {
        let cursor = pos.checked_sub(1)?;
        let mut stack = Vec::new();
        let mut in_string = false;
        for (i, &c) in chars.iter().enumerate() {
            if in_string {
                in_string = c != '"';
                continue;
            }
            match c {
                '"' => in_string = true,
                '(' | '{' => stack.push((c, i)),
                ')' | '}' => {
                    if let Some((open, start)) = stack.pop()
                        && is_pair(open, c)
                        && (start == cursor || i == cursor)
                    {
                        return Some((start, i));
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl Highlighter for KlHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let chars: Vec<char> = line.chars().collect();
        let matched = KlHighlighter::matching_bracket(&chars, pos);
        let mut highlighted = String::with_capacity(line.len());
        let mut in_string = false;

        for (i, &c) in chars.iter().enumerate() {
            if in_string || c == '"' {
                if in_string {
                    in_string = c != '"';
                } else {
                    in_string = true;
                }
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
            } else if matched.is_some_and(|(open, close)| i == open || i == close) {
                highlighted.push_str(&format!("\x1b[1;34m{}\x1b[0m", c)); // Blue for matching brackets
            } else {
                highlighted.push(c);
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn run_entry(interp: &SharedInterpreter, input: &str) {
    let result = parse_str(input).map_err(Error::from).and_then(|program| {
        interp
            .borrow_mut()
            .execute(&program)
            .map_err(Error::from)
    });
    if let Err(e) = result
        && e.pretty_print("REPL", input).is_err()
    {
        eprintln!("{}", e);
    }
}

fn main() -> rustyline::Result<()> {
    println!("KL REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let interp: SharedInterpreter = Rc::new(RefCell::new(Interpreter::new(io::stdout())));
    let h = KlHelper {
        highlighter: KlHighlighter,
        validator: KlValidator,
        completer: KlCompleter {
            interp: Rc::clone(&interp),
        },
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("kl> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }
                run_entry(&interp, input);
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
