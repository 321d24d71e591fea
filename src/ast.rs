use crate::source::Span;
use std::fmt;
use std::rc::Rc;

/// Declared kind of a variable, parameter or function result.
/// `Inferred` is written `var` in source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Num,
    Str,
    Inferred,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Num => write!(f, "num"),
            DeclKind::Str => write!(f, "str"),
            DeclKind::Inferred => write!(f, "var"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    Xor,
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::Xor => "xor",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Postfix {
        op: PostfixOp,
        target: String,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

// Fully parenthesised rendering, so the shape of the tree is visible.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Number(n) => write!(f, "{}", n),
            ExprKind::Str(s) => write!(f, "\"{}\"", s),
            ExprKind::Variable(name) => write!(f, "{}", name),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "(-{})", operand),
                UnaryOp::Not => write!(f, "(!{})", operand),
            },
            ExprKind::Postfix { op, target } => match op {
                PostfixOp::Inc => write!(f, "({}++)", target),
                PostfixOp::Dec => write!(f, "({}--)", target),
            },
            ExprKind::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: DeclKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub return_kind: DeclKind,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

impl FuncDecl {
    /// `func num add(num a, num b)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.kind, p.name))
            .collect();
        format!(
            "func {} {}({})",
            self.return_kind,
            self.name,
            params.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElifBranch {
    pub condition: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    VarDecl {
        name: String,
        kind: DeclKind,
        init: Expr,
    },
    Assign {
        target: String,
        value: Expr,
    },
    Print {
        exprs: Vec<Expr>,
    },
    If {
        condition: Expr,
        then_body: Block,
        elif_branches: Vec<ElifBranch>,
        else_body: Option<Block>,
    },
    While {
        condition: Expr,
        body: Block,
    },
    Block(Block),
    // Shared so that registering a function does not copy its body
    FuncDecl(Rc<FuncDecl>),
    Return(Option<Expr>),
    Import {
        module: String,
    },
    Expr(Expr),
}
