use crate::ast::{BinaryOp, UnaryOp};
use crate::evaluator::{EvalResult, RuntimeError};
use crate::source::Span;
use crate::value::Value;

/// Reads a value as a number. An absent value reads as zero; strings are rejected.
pub fn expect_number(value: &Value, span: Span) -> EvalResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Nil => Ok(0.0),
        Value::Str(_) => Err(RuntimeError::TypeMismatch {
            expected: "num",
            found: "str",
            span,
        }),
    }
}

pub fn apply_binary(op: BinaryOp, left: Value, right: Value, span: Span) -> EvalResult {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => string_binary(op, a, b, span),
        (left, right) => {
            let a = expect_number(&left, span)?;
            let b = expect_number(&right, span)?;
            numeric_binary(op, a, b, span).map(Value::Number)
        }
    }
}

fn string_binary(op: BinaryOp, a: String, b: String, span: Span) -> EvalResult {
    let result = match op {
        BinaryOp::Add => return Ok(Value::Str(a + &b)),
        BinaryOp::Less => a < b,
        BinaryOp::Greater => a > b,
        BinaryOp::Equal => a == b,
        BinaryOp::NotEqual => a != b,
        BinaryOp::LessEqual => a <= b,
        BinaryOp::GreaterEqual => a >= b,
        _ => {
            return Err(RuntimeError::TypeMismatch {
                expected: "num",
                found: "str",
                span,
            });
        }
    };
    Ok(Value::from_bool(result))
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

// Saturating conversion, the same truncation `as` performs.
fn to_int(x: f64) -> i64 {
    x as i64
}

fn fits_int(x: f64) -> bool {
    x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64
}

pub fn numeric_binary(op: BinaryOp, a: f64, b: f64, span: Span) -> EvalResult<f64> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { span });
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::ModuloByZero { span });
            }
            if fits_int(a) && fits_int(b) {
                to_int(a).wrapping_rem(to_int(b)) as f64
            } else {
                // A fractional operand keeps its fraction: 2.5 % 1 == 0.5
                a % b
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b == 0.0 {
                return Err(RuntimeError::ZeroToZeroPower { span });
            }
            a.powf(b)
        }
        BinaryOp::BitAnd => (to_int(a) & to_int(b)) as f64,
        BinaryOp::BitOr => (to_int(a) | to_int(b)) as f64,
        BinaryOp::Xor => (to_int(a) ^ to_int(b)) as f64,
        BinaryOp::Less => truth(a < b),
        BinaryOp::Greater => truth(a > b),
        BinaryOp::Equal => truth(a == b),
        BinaryOp::NotEqual => truth(a != b),
        BinaryOp::LessEqual => truth(a <= b),
        BinaryOp::GreaterEqual => truth(a >= b),
    };
    Ok(result)
}

pub fn apply_unary(op: UnaryOp, operand: Value, span: Span) -> EvalResult {
    match op {
        UnaryOp::Neg => Ok(Value::Number(-expect_number(&operand, span)?)),
        UnaryOp::Not => Ok(Value::from_bool(!operand.is_truthy())),
    }
}
