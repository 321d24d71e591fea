use crate::ast::{Block, DeclKind, Expr, ExprKind, FuncDecl, PostfixOp, Stmt, StmtKind};
use crate::builtins::{BuiltinError, FunctionMeta, ModuleRegistry};
use crate::environment::{EnvError, Scope, lookup, lookup_mut};
use crate::operators::{apply_binary, apply_unary, expect_number};
use crate::source::Span;
use crate::value::Value;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

/// Nesting limit for user function calls. Fits a 2 MiB thread stack in a debug build.
pub const MAX_CALL_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("undefined function '{name}'")]
    UndefinedFunction { name: String, span: Span },
    #[error("function '{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        span: Span,
    },
    #[error("division by zero")]
    DivisionByZero { span: Span },
    #[error("modulo by zero")]
    ModuloByZero { span: Span },
    #[error("0^0 is undefined")]
    ZeroToZeroPower { span: Span },
    #[error("bad builtin signature for '{name}': {reason}")]
    BadBuiltinSignature {
        name: String,
        reason: String,
        span: Span,
    },
    #[error("{message}")]
    Domain {
        name: String,
        message: String,
        span: Span,
    },
    #[error("unknown module '{name}'")]
    UnknownModule { name: String, span: Span },
    #[error("'{name}' is a module constant and cannot be modified")]
    ReadOnlyConstant { name: String, span: Span },
    #[error("return outside of a function")]
    ReturnOutsideFunction { span: Span },
    #[error("call to '{name}' exceeds the nesting limit of {limit}")]
    RecursionLimit {
        name: String,
        limit: usize,
        span: Span,
    },
    #[error("cannot write output: {message}")]
    Output { message: String, span: Span },
}

impl RuntimeError {
    pub fn span(&self) -> Span {
        match self {
            RuntimeError::Env(EnvError::UndefinedVariable(_, span)) => *span,
            RuntimeError::UndefinedFunction { span, .. }
            | RuntimeError::ArityMismatch { span, .. }
            | RuntimeError::TypeMismatch { span, .. }
            | RuntimeError::DivisionByZero { span }
            | RuntimeError::ModuloByZero { span }
            | RuntimeError::ZeroToZeroPower { span }
            | RuntimeError::BadBuiltinSignature { span, .. }
            | RuntimeError::Domain { span, .. }
            | RuntimeError::UnknownModule { span, .. }
            | RuntimeError::ReadOnlyConstant { span, .. }
            | RuntimeError::ReturnOutsideFunction { span }
            | RuntimeError::RecursionLimit { span, .. }
            | RuntimeError::Output { span, .. } => *span,
        }
    }
}

pub type EvalResult<T = Value> = Result<T, RuntimeError>;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// The interpreter context: everything a running program can see.
///
/// Name resolution is exactly two deep. Statements run against an optional
/// innermost scope and the root scope; a nested body (if, while, block or
/// function) gets a fresh innermost scope that replaces the current one until
/// it finishes.
pub struct Interpreter<W: Write> {
    root: Scope,
    functions: HashMap<String, Rc<FuncDecl>>,
    registry: ModuleRegistry,
    imported: Vec<String>,
    out: W,
    depth: usize,
    max_depth: usize,
}

impl<W: Write> Interpreter<W> {
    /// An interpreter with the standard modules available for import.
    pub fn new(out: W) -> Self {
        Interpreter::with_registry(out, ModuleRegistry::standard())
    }

    pub fn with_registry(out: W, registry: ModuleRegistry) -> Self {
        Interpreter {
            root: Scope::new(),
            functions: HashMap::new(),
            registry,
            imported: Vec::new(),
            out,
            depth: 0,
            max_depth: MAX_CALL_DEPTH,
        }
    }

    pub fn with_call_limit(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Runs a program (or one REPL entry) against the root scope.
    pub fn execute(&mut self, program: &Block) -> EvalResult<()> {
        self.depth = 0;
        match self.exec_statements(&program.statements, None)? {
            Flow::Normal => Ok(()),
            // A top-level return is rejected before it can propagate
            Flow::Return(_) => Err(RuntimeError::ReturnOutsideFunction { span: program.span }),
        }
    }

    pub fn root(&self) -> &Scope {
        &self.root
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn function(&self, name: &str) -> Option<&FuncDecl> {
        self.functions.get(name).map(|f| f.as_ref())
    }

    pub fn imported_modules(&self) -> &[String] {
        &self.imported
    }

    /// Every name a program could refer to right now: globals, user
    /// functions and the functions and constants of imported modules.
    pub fn identifiers(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.root.names().into_iter().collect();
        names.extend(self.functions.keys().cloned());
        for module in self.imported.iter().filter_map(|m| self.registry.get(m)) {
            names.extend(module.function_names().map(String::from));
            names.extend(module.constant_names().map(String::from));
        }
        names.into_iter().collect()
    }

    /// One `name: kind = value` line per global, ordered by name.
    pub fn dump_environment(&self) -> String {
        self.root
            .sorted()
            .into_iter()
            .map(|(name, value)| format!("{}: {} = {}\n", name, value.type_name(), value))
            .collect()
    }

    /// One signature line per user function, ordered by name.
    pub fn dump_functions(&self) -> String {
        let mut functions: Vec<&Rc<FuncDecl>> = self.functions.values().collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        functions
            .into_iter()
            .map(|f| format!("{}\n", f.signature()))
            .collect()
    }

    fn exec_statements(
        &mut self,
        statements: &[Stmt],
        mut local: Option<&mut Scope>,
    ) -> EvalResult<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.exec_stmt(stmt, local.as_deref_mut())? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_in_fresh_scope(&mut self, body: &Block) -> EvalResult<Flow> {
        let mut scope = Scope::new();
        self.exec_statements(&body.statements, Some(&mut scope))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, mut local: Option<&mut Scope>) -> EvalResult<Flow> {
        match &stmt.kind {
            StmtKind::VarDecl { name, kind, init } => {
                let value = self.eval_expr(init, local.as_deref_mut())?;
                let value = coerce_to_kind(*kind, value, init.span)?;
                match local {
                    Some(scope) => scope.define(name.as_str(), value),
                    None => self.root.define(name.as_str(), value),
                }
            }
            StmtKind::Assign { target, value } => {
                let new_value = self.eval_expr(value, local.as_deref_mut())?;
                self.assign(target, new_value, local, stmt.span)?;
            }
            StmtKind::Print { exprs } => {
                let mut line = String::new();
                for expr in exprs {
                    let value = self.eval_expr(expr, local.as_deref_mut())?;
                    line.push_str(&value.coerce_string());
                }
                writeln!(self.out, "{}", line).map_err(|e| RuntimeError::Output {
                    message: e.to_string(),
                    span: stmt.span,
                })?;
            }
            StmtKind::If {
                condition,
                then_body,
                elif_branches,
                else_body,
            } => {
                if self.eval_expr(condition, local.as_deref_mut())?.is_truthy() {
                    return self.exec_in_fresh_scope(then_body);
                }
                for branch in elif_branches {
                    if self
                        .eval_expr(&branch.condition, local.as_deref_mut())?
                        .is_truthy()
                    {
                        return self.exec_in_fresh_scope(&branch.body);
                    }
                }
                if let Some(body) = else_body {
                    return self.exec_in_fresh_scope(body);
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval_expr(condition, local.as_deref_mut())?.is_truthy() {
                    if let Flow::Return(value) = self.exec_in_fresh_scope(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            StmtKind::Block(block) => return self.exec_in_fresh_scope(block),
            StmtKind::FuncDecl(decl) => {
                self.functions.insert(decl.name.clone(), Rc::clone(decl));
            }
            StmtKind::Return(expr) => {
                if self.depth == 0 {
                    return Err(RuntimeError::ReturnOutsideFunction { span: stmt.span });
                }
                let value = match expr {
                    Some(expr) => self.eval_expr(expr, local)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Import { module } => self.import(module, stmt.span)?,
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, local)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn import(&mut self, module: &str, span: Span) -> EvalResult<()> {
        if self.registry.get(module).is_none() {
            return Err(RuntimeError::UnknownModule {
                name: module.to_string(),
                span,
            });
        }
        if !self.imported.iter().any(|m| m == module) {
            self.imported.push(module.to_string());
        }
        Ok(())
    }

    fn assign(
        &mut self,
        target: &str,
        value: Value,
        local: Option<&mut Scope>,
        span: Span,
    ) -> EvalResult<()> {
        let defined =
            local.as_ref().is_some_and(|s| s.contains(target)) || self.root.contains(target);
        if !defined && self.constant(target).is_some() {
            return Err(RuntimeError::ReadOnlyConstant {
                name: target.to_string(),
                span,
            });
        }
        let slot = lookup_mut(local, &mut self.root, target, span)?;
        let coerced = match &*slot {
            Value::Number(_) => Value::Number(expect_number(&value, span)?),
            Value::Str(_) => Value::Str(value.coerce_string()),
            Value::Nil => value,
        };
        *slot = coerced;
        Ok(())
    }

    fn constant(&self, name: &str) -> Option<&Value> {
        self.imported
            .iter()
            .filter_map(|m| self.registry.get(m))
            .find_map(|module| module.constant(name))
    }

    fn builtin(&self, name: &str) -> Option<&FunctionMeta> {
        self.imported
            .iter()
            .filter_map(|m| self.registry.get(m))
            .find_map(|module| module.function(name))
    }

    fn resolve(&self, name: &str, local: Option<&Scope>) -> Value {
        lookup(local, &self.root, name)
            .or_else(|| self.constant(name))
            .cloned()
            // Unknown names read as zero
            .unwrap_or(Value::Number(0.0))
    }

    fn eval_expr(&mut self, expr: &Expr, mut local: Option<&mut Scope>) -> EvalResult {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Variable(name) => Ok(self.resolve(name, local.as_deref())),
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(left, local.as_deref_mut())?;
                let right = self.eval_expr(right, local)?;
                apply_binary(*op, left, right, expr.span)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval_expr(operand, local)?;
                apply_unary(*op, operand, expr.span)
            }
            ExprKind::Postfix { op, target } => self.postfix(*op, target, local, expr.span),
            ExprKind::Call { name, args } => self.call(name, args, local, expr.span),
        }
    }

    fn postfix(
        &mut self,
        op: PostfixOp,
        target: &str,
        local: Option<&mut Scope>,
        span: Span,
    ) -> EvalResult {
        let defined =
            local.as_ref().is_some_and(|s| s.contains(target)) || self.root.contains(target);
        if !defined && self.constant(target).is_some() {
            return Err(RuntimeError::ReadOnlyConstant {
                name: target.to_string(),
                span,
            });
        }
        let slot = lookup_mut(local, &mut self.root, target, span)?;
        let Value::Number(old) = *slot else {
            return Err(RuntimeError::TypeMismatch {
                expected: "num",
                found: slot.type_name(),
                span,
            });
        };
        let new = match op {
            PostfixOp::Inc => old + 1.0,
            PostfixOp::Dec => old - 1.0,
        };
        *slot = Value::Number(new);
        Ok(Value::Number(old))
    }

    /// User functions shadow built-ins; built-ins are searched in import order.
    fn call(
        &mut self,
        name: &str,
        args: &[Expr],
        mut local: Option<&mut Scope>,
        span: Span,
    ) -> EvalResult {
        if let Some(decl) = self.functions.get(name).cloned() {
            return self.call_user(&decl, args, local, span);
        }
        let Some(meta) = self.builtin(name).cloned() else {
            return Err(RuntimeError::UndefinedFunction {
                name: name.to_string(),
                span,
            });
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, local.as_deref_mut())?);
        }
        meta.call(values).map_err(|err| match err {
            BuiltinError::Domain(message) => RuntimeError::Domain {
                name: name.to_string(),
                message,
                span,
            },
            other => RuntimeError::BadBuiltinSignature {
                name: name.to_string(),
                reason: other.to_string(),
                span,
            },
        })
    }

    fn call_user(
        &mut self,
        decl: &FuncDecl,
        args: &[Expr],
        mut local: Option<&mut Scope>,
        span: Span,
    ) -> EvalResult {
        if args.len() != decl.params.len() {
            return Err(RuntimeError::ArityMismatch {
                name: decl.name.clone(),
                expected: decl.params.len(),
                found: args.len(),
                span,
            });
        }
        if self.depth >= self.max_depth {
            return Err(RuntimeError::RecursionLimit {
                name: decl.name.clone(),
                limit: self.max_depth,
                span,
            });
        }

        // Arguments are evaluated in the caller's scope
        let mut frame = Scope::new();
        for (param, arg) in decl.params.iter().zip(args) {
            let value = self.eval_expr(arg, local.as_deref_mut())?;
            frame.define(param.name.as_str(), coerce_to_kind(param.kind, value, arg.span)?);
        }

        self.depth += 1;
        let flow = self.exec_statements(&decl.body.statements, Some(&mut frame));
        self.depth -= 1;

        match flow? {
            Flow::Return(Value::Nil) | Flow::Normal => Ok(Value::Nil),
            Flow::Return(value) => coerce_to_kind(decl.return_kind, value, span),
        }
    }
}

/// Converts a value to a declared kind: `num` needs a number (nil reads as
/// zero), `str` takes the printed form, `var` keeps the value as it is.
pub fn coerce_to_kind(kind: DeclKind, value: Value, span: Span) -> EvalResult {
    match kind {
        DeclKind::Num => Ok(Value::Number(expect_number(&value, span)?)),
        DeclKind::Str => Ok(Value::Str(value.coerce_string())),
        DeclKind::Inferred => Ok(value),
    }
}
