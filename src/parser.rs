use crate::Span;
use crate::ast::{
    BinaryOp, Block, DeclKind, ElifBranch, Expr, ExprKind, FuncDecl, Param, PostfixOp, Stmt,
    StmtKind, UnaryOp,
};
use crate::lexer::{LexError, Lexer, Token, TokenKind};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError), // Propagate lexer errors, the parser pulls tokens on demand
    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken {
        found: TokenKind,
        expected: String,
        span: Span,
    },
    #[error("postfix target must be a variable")]
    PostfixTarget { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(lex_err) => lex_err.span,
            ParseError::UnexpectedToken { span, .. } | ParseError::PostfixTarget { span } => *span,
        }
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

/// Binding power of the binary operators handled by precedence climbing.
/// `^` is parsed separately because it is right-associative and binds
/// tighter than unary minus.
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::Less => (BinaryOp::Less, 1),
        TokenKind::Greater => (BinaryOp::Greater, 1),
        TokenKind::EqualEqual => (BinaryOp::Equal, 1),
        TokenKind::NotEqual => (BinaryOp::NotEqual, 1),
        TokenKind::LessEqual => (BinaryOp::LessEqual, 1),
        TokenKind::GreaterEqual => (BinaryOp::GreaterEqual, 1),
        TokenKind::Pipe => (BinaryOp::BitOr, 2),
        TokenKind::Xor => (BinaryOp::Xor, 3),
        TokenKind::Ampersand => (BinaryOp::BitAnd, 4),
        TokenKind::Plus => (BinaryOp::Add, 5),
        TokenKind::Minus => (BinaryOp::Sub, 5),
        TokenKind::Star => (BinaryOp::Mul, 6),
        TokenKind::Slash => (BinaryOp::Div, 6),
        TokenKind::Percent => (BinaryOp::Mod, 6),
        _ => return None,
    };
    Some(entry)
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    // One token of lookahead
    current: Token,
}

impl<'src> Parser<'src> {
    /// Creates a parser and primes the lookahead token.
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    // Consumes the current token, returning it.
    fn advance(&mut self) -> ParseResult<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            found: self.current.kind.clone(),
            expected: expected.to_string(),
            span: self.current.span,
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(&kind) {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<(String, Span)> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.advance()?.span;
                Ok((name, span))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn expect_decl_kind(&mut self, expected: &str) -> ParseResult<DeclKind> {
        let kind = match self.current.kind {
            TokenKind::Num => DeclKind::Num,
            TokenKind::Str => DeclKind::Str,
            TokenKind::Var => DeclKind::Inferred,
            _ => return Err(self.unexpected(expected)),
        };
        self.advance()?;
        Ok(kind)
    }

    /// Parses every statement up to end of input into the root block.
    pub fn parse_program(mut self) -> ParseResult<Block> {
        let start = self.current.span.start;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        let end = self.current.span.end;
        Ok(Block {
            statements,
            span: Span::new(start.min(end), end),
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.current.kind {
            TokenKind::Num | TokenKind::Str | TokenKind::Var => self.parse_declaration(),
            TokenKind::Print => self.parse_print(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Func => self.parse_function(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Import => self.parse_import(),
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Stmt::new(StmtKind::Block(block), span))
            }
            TokenKind::Identifier(_) => self.parse_identifier_statement(),
            _ => Err(self.unexpected("a statement")),
        }
    }

    /// `(num|str|var) IDENT '=' expr ';'`
    fn parse_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.current.span.start;
        let kind = self.expect_decl_kind("'num', 'str' or 'var'")?;
        let (name, _) = self.expect_identifier("a variable name")?;
        self.expect(TokenKind::Assign, "'='")?;
        let init = self.parse_expression()?;
        let end = self.expect(TokenKind::Semicolon, "';'")?.span.end;
        Ok(Stmt::new(
            StmtKind::VarDecl { name, kind, init },
            Span::new(start, end),
        ))
    }

    /// `print '(' [item ('+' item)*] ')' ';'` where `+` separates items.
    fn parse_print(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Print, "'print'")?.span.start;
        self.expect(TokenKind::LParen, "'(' after 'print'")?;
        let mut exprs = Vec::new();
        if !self.check(&TokenKind::RParen) {
            exprs.push(self.parse_binary(0, true)?);
            while self.check(&TokenKind::Plus) {
                self.advance()?;
                exprs.push(self.parse_binary(0, true)?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let end = self.expect(TokenKind::Semicolon, "';'")?.span.end;
        Ok(Stmt::new(StmtKind::Print { exprs }, Span::new(start, end)))
    }

    fn parse_condition(&mut self) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::If, "'if'")?.span.start;
        let condition = self.parse_condition()?;
        let then_body = self.parse_block()?;
        let mut end = then_body.span.end;

        let mut elif_branches = Vec::new();
        while self.check(&TokenKind::Elif) {
            self.advance()?;
            let condition = self.parse_condition()?;
            let body = self.parse_block()?;
            end = body.span.end;
            elif_branches.push(ElifBranch { condition, body });
        }

        let else_body = if self.check(&TokenKind::Else) {
            self.advance()?;
            let body = self.parse_block()?;
            end = body.span.end;
            Some(body)
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_body,
                elif_branches,
                else_body,
            },
            Span::new(start, end),
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::While, "'while'")?.span.start;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        let span = Span::new(start, body.span.end);
        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    /// `'{' statement* '}'`
    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.span.start;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        let end = self.advance()?.span.end;
        Ok(Block {
            statements,
            span: Span::new(start, end),
        })
    }

    /// `func KIND NAME '(' [KIND IDENT (',' KIND IDENT)*] ')' block`
    fn parse_function(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Func, "'func'")?.span.start;
        let return_kind = self.expect_decl_kind("a return kind ('num', 'str' or 'var')")?;
        let (name, _) = self.expect_identifier("a function name")?;
        self.expect(TokenKind::LParen, "'('")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let kind = self.expect_decl_kind("a parameter kind ('num', 'str' or 'var')")?;
                let (name, _) = self.expect_identifier("a parameter name")?;
                params.push(Param { name, kind });
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        let body = self.parse_block()?;
        let span = Span::new(start, body.span.end);
        let decl = FuncDecl {
            name,
            return_kind,
            params,
            body,
            span,
        };
        Ok(Stmt::new(StmtKind::FuncDecl(Rc::new(decl)), span))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Return, "'return'")?.span.start;
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let end = self.expect(TokenKind::Semicolon, "';'")?.span.end;
        Ok(Stmt::new(StmtKind::Return(value), Span::new(start, end)))
    }

    fn parse_import(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Import, "'import'")?.span.start;
        let (module, _) = self.expect_identifier("a module name")?;
        let end = self.expect(TokenKind::Semicolon, "';'")?.span.end;
        Ok(Stmt::new(StmtKind::Import { module }, Span::new(start, end)))
    }

    /// Either `IDENT '=' expr ';'` or an expression statement starting with `IDENT`.
    fn parse_identifier_statement(&mut self) -> ParseResult<Stmt> {
        let (name, name_span) = self.expect_identifier("an identifier")?;

        let kind = if self.check(&TokenKind::Assign) {
            self.advance()?;
            let value = self.parse_expression()?;
            StmtKind::Assign {
                target: name,
                value,
            }
        } else {
            let primary = self.finish_identifier(name, name_span)?;
            let base = self.finish_postfix(primary)?;
            let left = self.finish_power(base)?;
            StmtKind::Expr(self.continue_binary(left, 0, false)?)
        };

        let end = self.expect(TokenKind::Semicolon, "';'")?.span.end;
        Ok(Stmt::new(kind, Span::new(name_span.start, end)))
    }

    /// Parses a full expression.
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary(0, false)
    }

    // With `plus_is_separator` set, a top-level `+` ends the expression (print lists).
    fn parse_binary(&mut self, min_prec: u8, plus_is_separator: bool) -> ParseResult<Expr> {
        let left = self.parse_unary()?;
        self.continue_binary(left, min_prec, plus_is_separator)
    }

    fn continue_binary(
        &mut self,
        mut left: Expr,
        min_prec: u8,
        plus_is_separator: bool,
    ) -> ParseResult<Expr> {
        while let Some((op, prec)) = binary_op(&self.current.kind) {
            if prec < min_prec || (plus_is_separator && op == BinaryOp::Add) {
                break;
            }
            self.advance()?;
            let right = self.parse_binary(prec + 1, plus_is_separator)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.current.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        let start = self.advance()?.span.start;
        let operand = self.parse_unary()?;
        let span = Span::new(start, operand.span.end);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let primary = self.parse_primary()?;
        let base = self.finish_postfix(primary)?;
        self.finish_power(base)
    }

    fn finish_power(&mut self, base: Expr) -> ParseResult<Expr> {
        if !self.check(&TokenKind::Caret) {
            return Ok(base);
        }
        self.advance()?;
        // Right-associative; the exponent may carry its own sign (`2 ^ -1`)
        let exponent = self.parse_unary()?;
        let span = base.span.merge(exponent.span);
        Ok(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            span,
        ))
    }

    fn finish_postfix(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            let op = match self.current.kind {
                TokenKind::PlusPlus => PostfixOp::Inc,
                TokenKind::MinusMinus => PostfixOp::Dec,
                _ => return Ok(expr),
            };
            let op_span = self.advance()?.span;
            let span = expr.span.merge(op_span);
            expr = match expr.kind {
                ExprKind::Variable(target) => Expr::new(ExprKind::Postfix { op, target }, span),
                _ => return Err(ParseError::PostfixTarget { span }),
            };
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match &self.current.kind {
            TokenKind::Number(n) => {
                let kind = ExprKind::Number(*n);
                Ok(Expr::new(kind, self.advance()?.span))
            }
            TokenKind::String(s) => {
                let kind = ExprKind::Str(s.clone());
                Ok(Expr::new(kind, self.advance()?.span))
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.advance()?.span;
                self.finish_identifier(name, span)
            }
            TokenKind::LParen => {
                let start = self.advance()?.span.start;
                let mut inner = self.parse_expression()?;
                let end = self.expect(TokenKind::RParen, "')'")?.span.end;
                inner.span = Span::new(start, end);
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    // A call when the identifier is followed by '(', otherwise a variable reference.
    fn finish_identifier(&mut self, name: String, span: Span) -> ParseResult<Expr> {
        if !self.check(&TokenKind::LParen) {
            return Ok(Expr::new(ExprKind::Variable(name), span));
        }
        self.advance()?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance()?;
            }
        }
        let end = self.expect(TokenKind::RParen, "')' after arguments")?.span.end;
        Ok(Expr::new(
            ExprKind::Call { name, args },
            Span::new(span.start, end),
        ))
    }
}

// Helper function to lex and parse a whole program (useful for tests and the REPL)
pub fn parse_str(input: &str) -> ParseResult<Block> {
    Parser::new(input)?.parse_program()
}
