//! Registry of importable modules and the dispatch glue between interpreter
//! values and built-in routines.
//!
//! A built-in is described by a [`FunctionMeta`]: its parameter kinds, its
//! return kind and a plain function pointer. The evaluator never sees the
//! concrete prototypes; it hands over [`Value`]s, [`FunctionMeta::call`]
//! packs them into [`Arg`]s according to the signature, invokes the routine
//! and unpacks the result.

use crate::primitives;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Parameter and return kinds a built-in signature is made of.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Int,
    Double,
    Str,
    /// Only valid as the last parameter; absorbs every remaining argument.
    StrArray,
    Void,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Int => write!(f, "int"),
            Kind::Double => write!(f, "double"),
            Kind::Str => write!(f, "string"),
            Kind::StrArray => write!(f, "string..."),
            Kind::Void => write!(f, "void"),
        }
    }
}

/// A packed argument or result.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Double(f64),
    Str(String),
    StrArray(Vec<String>),
    Void,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuiltinError {
    #[error("{0}")]
    Domain(String),
    #[error("expected {expected} arguments, got {found}")]
    Arity { expected: String, found: usize },
    #[error("argument {position} must be {expected}, got {found}")]
    ArgumentKind {
        position: usize,
        expected: Kind,
        found: &'static str,
    },
    #[error("arguments do not match the declared signature")]
    Mismatch,
}

pub type BuiltinResult = Result<Arg, BuiltinError>;

/// Invoker of a built-in routine; receives arguments already packed to its signature.
pub type Invoker = fn(&[Arg]) -> BuiltinResult;

#[derive(Clone)] // Cheap: a function pointer and static data
pub struct FunctionMeta {
    pub name: &'static str,
    pub params: &'static [Kind],
    pub ret: Kind,
    invoke: Invoker,
}

impl fmt::Debug for FunctionMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.signature())
    }
}

impl FunctionMeta {
    pub const fn new(
        name: &'static str,
        params: &'static [Kind],
        ret: Kind,
        invoke: Invoker,
    ) -> Self {
        FunctionMeta {
            name,
            params,
            ret,
            invoke,
        }
    }

    /// `sqrt(double) -> double`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|k| k.to_string()).collect();
        format!("{}({}) -> {}", self.name, params.join(", "), self.ret)
    }

    fn is_variadic(&self) -> bool {
        matches!(self.params.last(), Some(Kind::StrArray))
    }

    /// Converts interpreter values into the argument vector the invoker expects.
    pub fn pack(&self, args: Vec<Value>) -> Result<Vec<Arg>, BuiltinError> {
        let fixed = if self.is_variadic() {
            self.params.len() - 1
        } else {
            self.params.len()
        };
        let arity_ok = if self.is_variadic() {
            args.len() >= fixed
        } else {
            args.len() == fixed
        };
        if !arity_ok {
            let expected = if self.is_variadic() {
                format!("at least {}", fixed)
            } else {
                fixed.to_string()
            };
            return Err(BuiltinError::Arity {
                expected,
                found: args.len(),
            });
        }

        let mut values = args.into_iter().enumerate();
        let mut packed = Vec::with_capacity(self.params.len());
        for (kind, (index, value)) in self.params[..fixed].iter().zip(values.by_ref()) {
            packed.push(pack_one(*kind, value, index + 1)?);
        }
        if self.is_variadic() {
            let mut rest = Vec::new();
            for (index, value) in values {
                match value {
                    Value::Str(s) => rest.push(s),
                    other => {
                        return Err(BuiltinError::ArgumentKind {
                            position: index + 1,
                            expected: Kind::Str,
                            found: other.type_name(),
                        });
                    }
                }
            }
            packed.push(Arg::StrArray(rest));
        }
        Ok(packed)
    }

    /// Packs `args`, runs the routine and converts its result back into a value.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, BuiltinError> {
        let packed = self.pack(args)?;
        let result = (self.invoke)(&packed)?;
        Ok(unpack(result))
    }
}

fn pack_one(kind: Kind, value: Value, position: usize) -> Result<Arg, BuiltinError> {
    match (kind, value) {
        // Truncation toward zero, saturating at the i64 bounds
        (Kind::Int, Value::Number(n)) => Ok(Arg::Int(n.trunc() as i64)),
        (Kind::Double, Value::Number(n)) => Ok(Arg::Double(n)),
        (Kind::Str, Value::Str(s)) => Ok(Arg::Str(s)),
        (expected, other) => Err(BuiltinError::ArgumentKind {
            position,
            expected,
            found: other.type_name(),
        }),
    }
}

pub fn unpack(result: Arg) -> Value {
    match result {
        Arg::Int(i) => Value::Number(i as f64),
        Arg::Double(d) => Value::Number(d),
        Arg::Str(s) => Value::Str(s),
        Arg::StrArray(items) => Value::Str(items.join(", ")),
        Arg::Void => Value::Nil,
    }
}

/// A named bundle of built-in functions and constants.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: &'static str,
    functions: HashMap<&'static str, FunctionMeta>,
    constants: HashMap<&'static str, Value>,
}

impl Module {
    pub fn new(name: &'static str) -> Self {
        Module {
            name,
            functions: HashMap::new(),
            constants: HashMap::new(),
        }
    }

    pub fn with_function(mut self, meta: FunctionMeta) -> Self {
        self.functions.insert(meta.name, meta);
        self
    }

    pub fn with_constant(mut self, name: &'static str, value: Value) -> Self {
        self.constants.insert(name, value);
        self
    }

    pub fn function(&self, name: &str) -> Option<&FunctionMeta> {
        self.functions.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    pub fn constant_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constants.keys().copied()
    }
}

/// Every module a program may import. Fixed once the interpreter is built.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<&'static str, Module>,
}

impl ModuleRegistry {
    pub fn empty() -> Self {
        ModuleRegistry::default()
    }

    /// The `math`, `trig` and `text` modules.
    pub fn standard() -> Self {
        let mut registry = ModuleRegistry::empty();
        registry.register(primitives::math_module());
        registry.register(primitives::trig_module());
        registry.register(primitives::text_module());
        registry
    }

    pub fn register(&mut self, module: Module) {
        self.modules.insert(module.name, module);
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }
}
