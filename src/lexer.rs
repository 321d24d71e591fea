use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

/// Reserved words of the language, in the order the REPL offers them for completion.
pub const KEYWORDS: &[&str] = &[
    "num", "str", "var", "if", "elif", "else", "while", "print", "func", "return", "import",
    "xor",
];

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line comments
#[logos(error = LexErrorKind)]
pub enum TokenKind {
    // --- Keywords ---
    #[token("num")]
    Num,
    #[token("str")]
    Str,
    #[token("var")]
    Var,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("print")]
    Print,
    #[token("func")]
    Func,
    #[token("return")]
    Return,
    #[token("import")]
    Import,
    #[token("xor")]
    Xor,

    // --- Atoms ---
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexErrorKind::InvalidNumber(slice.to_string()))
    })]
    Number(f64),
    #[regex(r#""[^"]*"?"#, |lex| {
        let slice = lex.slice();
        let len = slice.len();
        // make sure string was terminated
        if len == 1 || !slice.ends_with('"') {
            return Err(LexErrorKind::UnterminatedString);
        }
        Ok(slice[1..len - 1].to_string())
    })]
    String(String),

    // --- Operators ---
    #[token("=")]
    Assign,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("++")]
    PlusPlus,
    #[token("-")]
    Minus,
    #[token("--")]
    MinusMinus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,

    // --- Punctuators ---
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,

    // Never produced by logos; `Lexer::next_token` emits it once the input is consumed.
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Num => write!(f, "num"),
            TokenKind::Str => write!(f, "str"),
            TokenKind::Var => write!(f, "var"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Elif => write!(f, "elif"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Print => write!(f, "print"),
            TokenKind::Func => write!(f, "func"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Import => write!(f, "import"),
            TokenKind::Xor => write!(f, "xor"),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s), // Display with quotes for clarity
            TokenKind::Assign => write!(f, "="),
            TokenKind::EqualEqual => write!(f, "=="),
            TokenKind::NotEqual => write!(f, "!="),
            TokenKind::Less => write!(f, "<"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::PlusPlus => write!(f, "++"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::MinusMinus => write!(f, "--"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Ampersand => write!(f, "&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexErrorKind {
    #[error("unterminated string")]
    UnterminatedString,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    // logos reports input no rule matches with the default variant;
    // `Lexer::next_token` replaces it with `UnexpectedCharacter`.
    #[default]
    #[error("unrecognized input")]
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LexError {
    pub error: LexErrorKind,
    pub span: Span,
}

// Result type alias for convenience
pub type LexResult<T> = Result<T, LexError>;

/// A cursor over source text producing one token per call.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            inner: TokenKind::lexer(source),
        }
    }

    /// Produces the next token, skipping whitespace and comments.
    /// Once the input is exhausted every call yields `Eof`.
    pub fn next_token(&mut self) -> LexResult<Token> {
        match self.inner.next() {
            Some(Ok(kind)) => Ok(Token {
                kind,
                span: self.inner.span().into(),
            }),
            Some(Err(error)) => {
                let span: Span = self.inner.span().into();
                let error = match error {
                    LexErrorKind::Unrecognized => {
                        let c = self.inner.slice().chars().next().unwrap_or('\0');
                        LexErrorKind::UnexpectedCharacter(c)
                    }
                    other => other,
                };
                Err(LexError { error, span })
            }
            None => {
                let end = self.inner.source().len();
                Ok(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(end, end),
                })
            }
        }
    }
}

// Helper function to tokenize a string directly (useful for tests, the REPL and benches).
// The trailing `Eof` is not included.
pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        if token.kind == TokenKind::Eof {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    // Helper to simplify testing for lexer errors
    fn assert_lexer_error(input: &str, expected: LexErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(e) => assert_eq!(e.error, expected, "Input: '{}'", input),
        }
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("  \n\t ", vec![]);
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().unwrap().kind, ident("x"));
        for _ in 0..3 {
            let token = lexer.next_token().unwrap();
            assert_eq!(token.kind, TokenKind::Eof);
            assert_eq!(token.span, Span::new(1, 1));
        }
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_tokens(
            "num str var if while print",
            vec![
                TokenKind::Num,
                TokenKind::Str,
                TokenKind::Var,
                TokenKind::If,
                TokenKind::While,
                TokenKind::Print,
            ],
        );
        assert_tokens(
            "elif else func return import xor",
            vec![
                TokenKind::Elif,
                TokenKind::Else,
                TokenKind::Func,
                TokenKind::Return,
                TokenKind::Import,
                TokenKind::Xor,
            ],
        );
        // Keywords only win on an exact match
        assert_tokens(
            "number iffy x1 is_prime",
            vec![ident("number"), ident("iffy"), ident("x1"), ident("is_prime")],
        );
    }

    #[test]
    fn test_numbers() {
        assert_tokens("123", vec![TokenKind::Number(123.0)]);
        assert_tokens("6.78", vec![TokenKind::Number(6.78)]);
        assert_tokens(".5", vec![TokenKind::Number(0.5)]);
        assert_tokens("1.", vec![TokenKind::Number(1.0)]);
        assert_tokens("2.5e3", vec![TokenKind::Number(2500.0)]);
        assert_tokens("1E-2", vec![TokenKind::Number(0.01)]);
        // No signed literals: the minus is an operator
        assert_tokens("-4", vec![TokenKind::Minus, TokenKind::Number(4.0)]);
    }

    #[test]
    fn test_number_round_trip() {
        for input in ["0", "1", "2.5", "0.1", "123456.789", "1e21", "3.0000000000000004", ".75"] {
            let tokens = tokenize(input).unwrap();
            let TokenKind::Number(value) = tokens[0].kind else {
                panic!("expected a number for {}", input);
            };
            let relexed = tokenize(&value.to_string()).unwrap();
            assert_eq!(relexed[0].kind, TokenKind::Number(value), "Input: '{}'", input);
        }
    }

    #[test]
    fn test_strings() {
        assert_tokens(r#""hello""#, vec![TokenKind::String("hello".to_string())]);
        assert_tokens(r#""""#, vec![TokenKind::String(String::new())]);
        // No escape processing
        assert_tokens(
            r#""a\nb""#,
            vec![TokenKind::String("a\\nb".to_string())],
        );
        assert_tokens(
            r#""with spaces" x"#,
            vec![TokenKind::String("with spaces".to_string()), ident("x")],
        );
    }

    #[test]
    fn test_two_character_operators() {
        assert_tokens(
            "== <= >= != ++ --",
            vec![
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::NotEqual,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
            ],
        );
        assert_tokens(
            "= < > ! + -",
            vec![
                TokenKind::Assign,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Bang,
                TokenKind::Plus,
                TokenKind::Minus,
            ],
        );
        assert_tokens(
            "x++;",
            vec![ident("x"), TokenKind::PlusPlus, TokenKind::Semicolon],
        );
    }

    #[test]
    fn test_statement() {
        assert_tokens(
            "num x = (a * 2) % 3;",
            vec![
                TokenKind::Num,
                ident("x"),
                TokenKind::Assign,
                TokenKind::LParen,
                ident("a"),
                TokenKind::Star,
                TokenKind::Number(2.0),
                TokenKind::RParen,
                TokenKind::Percent,
                TokenKind::Number(3.0),
                TokenKind::Semicolon,
            ],
        );
        assert_tokens(
            "{ f(a, b) ^ 2 & 1 | 4 / 2 }",
            vec![
                TokenKind::LBrace,
                ident("f"),
                TokenKind::LParen,
                ident("a"),
                TokenKind::Comma,
                ident("b"),
                TokenKind::RParen,
                TokenKind::Caret,
                TokenKind::Number(2.0),
                TokenKind::Ampersand,
                TokenKind::Number(1.0),
                TokenKind::Pipe,
                TokenKind::Number(4.0),
                TokenKind::Slash,
                TokenKind::Number(2.0),
                TokenKind::RBrace,
            ],
        );
    }

    #[test]
    fn test_comments() {
        assert_tokens("// nothing here", vec![]);
        assert_tokens(
            "num x = 1; // trailing\nx++;",
            vec![
                TokenKind::Num,
                ident("x"),
                TokenKind::Assign,
                TokenKind::Number(1.0),
                TokenKind::Semicolon,
                ident("x"),
                TokenKind::PlusPlus,
                TokenKind::Semicolon,
            ],
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_lexer_error("\"", LexErrorKind::UnterminatedString);
        assert_lexer_error("print(\"abc", LexErrorKind::UnterminatedString);
    }

    #[test]
    fn test_unexpected_character() {
        assert_lexer_error("num x = 1 @ 2;", LexErrorKind::UnexpectedCharacter('@'));
        assert_lexer_error("$", LexErrorKind::UnexpectedCharacter('$'));
        assert_lexer_error(".", LexErrorKind::UnexpectedCharacter('.'));
    }

    #[test]
    fn test_token_spans() {
        let tokens = tokenize("num  x = \"ab\";").unwrap();
        let spans: Vec<Span> = tokens.iter().map(|t| t.span).collect();
        assert_eq!(
            spans,
            vec![
                Span::new(0, 3),
                Span::new(5, 6),
                Span::new(7, 8),
                Span::new(9, 13),
                Span::new(13, 14),
            ]
        );
    }

    #[test]
    fn test_error_span() {
        let err = tokenize("x = #").unwrap_err();
        assert_eq!(err.span, Span::new(4, 5));
        assert_eq!(err.to_string(), "unexpected character '#'");
    }
}
