use std::f64::consts;

use crate::builtins::{Arg, BuiltinError, BuiltinResult, FunctionMeta, Kind, Module};
use crate::value::Value;

fn domain_error(name: &str, detail: impl std::fmt::Display) -> BuiltinResult {
    Err(BuiltinError::Domain(format!("{}: {}", name, detail)))
}

fn flag(b: bool) -> BuiltinResult {
    Ok(Arg::Int(b as i64))
}

// double -> double, defined everywhere
macro_rules! double_fn {
    ($fname:ident, $op:expr) => {
        fn $fname(args: &[Arg]) -> BuiltinResult {
            let [Arg::Double(x)] = args else {
                return Err(BuiltinError::Mismatch);
            };
            Ok(Arg::Double($op(*x)))
        }
    };
}

// double -> double, rejecting arguments outside the routine's domain
macro_rules! checked_double_fn {
    ($fname:ident, $op:expr, $valid:expr, $domain:literal) => {
        fn $fname(args: &[Arg]) -> BuiltinResult {
            let [Arg::Double(x)] = args else {
                return Err(BuiltinError::Mismatch);
            };
            if !$valid(*x) {
                return domain_error(
                    stringify!($fname),
                    format_args!("{} is outside the domain {}", x, $domain),
                );
            }
            Ok(Arg::Double($op(*x)))
        }
    };
}

// --- math ---

double_fn!(abs, f64::abs);
double_fn!(floor, f64::floor);
double_fn!(ceil, f64::ceil);
double_fn!(round, f64::round);
double_fn!(exp, f64::exp);
checked_double_fn!(sqrt, f64::sqrt, |x: f64| x >= 0.0, "x >= 0");
checked_double_fn!(ln, f64::ln, |x: f64| x > 0.0, "x > 0");
checked_double_fn!(log10, f64::log10, |x: f64| x > 0.0, "x > 0");
checked_double_fn!(log2, f64::log2, |x: f64| x > 0.0, "x > 0");

fn pow(args: &[Arg]) -> BuiltinResult {
    let [Arg::Double(base), Arg::Double(exponent)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    if *base == 0.0 && *exponent == 0.0 {
        return domain_error("pow", "0 ^ 0 is undefined");
    }
    Ok(Arg::Double(base.powf(*exponent)))
}

fn min(args: &[Arg]) -> BuiltinResult {
    let [Arg::Double(a), Arg::Double(b)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Double(a.min(*b)))
}

fn max(args: &[Arg]) -> BuiltinResult {
    let [Arg::Double(a), Arg::Double(b)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Double(a.max(*b)))
}

fn factorial(args: &[Arg]) -> BuiltinResult {
    let [Arg::Int(n)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    match *n {
        n if n < 0 => domain_error("factorial", format_args!("{} is negative", n)),
        n if n > 20 => domain_error("factorial", format_args!("{}! does not fit in 64 bits", n)),
        n => Ok(Arg::Int((1..=n).product())),
    }
}

fn fib(args: &[Arg]) -> BuiltinResult {
    let [Arg::Int(n)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    if *n < 0 || *n > 92 {
        return domain_error("fib", format_args!("{} is outside 0..=92", n));
    }
    let (mut a, mut b) = (0i64, 1i64);
    for _ in 0..*n {
        (a, b) = (b, a + b);
    }
    Ok(Arg::Int(a))
}

fn gcd_of(mut a: i64, mut b: i64) -> i64 {
    a = a.wrapping_abs();
    b = b.wrapping_abs();
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn gcd(args: &[Arg]) -> BuiltinResult {
    let [Arg::Int(a), Arg::Int(b)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Int(gcd_of(*a, *b)))
}

fn lcm(args: &[Arg]) -> BuiltinResult {
    let [Arg::Int(a), Arg::Int(b)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    if *a == 0 || *b == 0 {
        return Ok(Arg::Int(0));
    }
    match (a / gcd_of(*a, *b)).checked_mul(*b) {
        Some(l) => Ok(Arg::Int(l.wrapping_abs())),
        None => domain_error("lcm", "result does not fit in 64 bits"),
    }
}

fn is_prime(args: &[Arg]) -> BuiltinResult {
    let [Arg::Int(n)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    let n = *n;
    if n < 2 {
        return flag(false);
    }
    let mut d = 2i64;
    while d <= n / d {
        if n % d == 0 {
            return flag(false);
        }
        d += 1;
    }
    flag(true)
}

fn is_integer(args: &[Arg]) -> BuiltinResult {
    let [Arg::Double(x)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    flag(x.is_finite() && x.fract() == 0.0)
}

fn is_even(args: &[Arg]) -> BuiltinResult {
    let [Arg::Int(n)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    flag(n % 2 == 0)
}

fn is_odd(args: &[Arg]) -> BuiltinResult {
    let [Arg::Int(n)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    flag(n % 2 != 0)
}

/// Whether the decimal digits of the integer part of `|x|` read the same both ways.
fn is_palindrome(args: &[Arg]) -> BuiltinResult {
    let [Arg::Double(x)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    if !x.is_finite() {
        return domain_error("is_palindrome", format_args!("{} is not finite", x));
    }
    let digits = x.abs().trunc().to_string();
    flag(digits.chars().eq(digits.chars().rev()))
}

fn assert(args: &[Arg]) -> BuiltinResult {
    let [Arg::Double(cond)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    if *cond == 0.0 {
        return domain_error("assert", "assertion failed");
    }
    Ok(Arg::Void)
}

pub fn math_module() -> Module {
    use Kind::{Double, Int, Void};
    Module::new("math")
        .with_function(FunctionMeta::new("sqrt", &[Double], Double, sqrt))
        .with_function(FunctionMeta::new("abs", &[Double], Double, abs))
        .with_function(FunctionMeta::new("floor", &[Double], Double, floor))
        .with_function(FunctionMeta::new("ceil", &[Double], Double, ceil))
        .with_function(FunctionMeta::new("round", &[Double], Double, round))
        .with_function(FunctionMeta::new("exp", &[Double], Double, exp))
        .with_function(FunctionMeta::new("ln", &[Double], Double, ln))
        .with_function(FunctionMeta::new("log10", &[Double], Double, log10))
        .with_function(FunctionMeta::new("log2", &[Double], Double, log2))
        .with_function(FunctionMeta::new("pow", &[Double, Double], Double, pow))
        .with_function(FunctionMeta::new("min", &[Double, Double], Double, min))
        .with_function(FunctionMeta::new("max", &[Double, Double], Double, max))
        .with_function(FunctionMeta::new("factorial", &[Int], Int, factorial))
        .with_function(FunctionMeta::new("fib", &[Int], Int, fib))
        .with_function(FunctionMeta::new("gcd", &[Int, Int], Int, gcd))
        .with_function(FunctionMeta::new("lcm", &[Int, Int], Int, lcm))
        .with_function(FunctionMeta::new("is_prime", &[Int], Int, is_prime))
        .with_function(FunctionMeta::new("is_integer", &[Double], Int, is_integer))
        .with_function(FunctionMeta::new("is_even", &[Int], Int, is_even))
        .with_function(FunctionMeta::new("is_odd", &[Int], Int, is_odd))
        .with_function(FunctionMeta::new("is_palindrome", &[Double], Int, is_palindrome))
        .with_function(FunctionMeta::new("assert", &[Double], Void, assert))
        .with_constant("PI", Value::Number(consts::PI))
        .with_constant("E", Value::Number(consts::E))
        .with_constant("TAU", Value::Number(consts::TAU))
}

// --- trig ---

double_fn!(sin, f64::sin);
double_fn!(cos, f64::cos);
double_fn!(tan, f64::tan);
double_fn!(atan, f64::atan);
double_fn!(sinh, f64::sinh);
double_fn!(cosh, f64::cosh);
double_fn!(tanh, f64::tanh);
double_fn!(radians, f64::to_radians);
double_fn!(degrees, f64::to_degrees);
checked_double_fn!(asin, f64::asin, |x: f64| (-1.0..=1.0).contains(&x), "[-1, 1]");
checked_double_fn!(acos, f64::acos, |x: f64| (-1.0..=1.0).contains(&x), "[-1, 1]");

fn atan2(args: &[Arg]) -> BuiltinResult {
    let [Arg::Double(y), Arg::Double(x)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Double(y.atan2(*x)))
}

pub fn trig_module() -> Module {
    use Kind::Double;
    Module::new("trig")
        .with_function(FunctionMeta::new("sin", &[Double], Double, sin))
        .with_function(FunctionMeta::new("cos", &[Double], Double, cos))
        .with_function(FunctionMeta::new("tan", &[Double], Double, tan))
        .with_function(FunctionMeta::new("asin", &[Double], Double, asin))
        .with_function(FunctionMeta::new("acos", &[Double], Double, acos))
        .with_function(FunctionMeta::new("atan", &[Double], Double, atan))
        .with_function(FunctionMeta::new("atan2", &[Double, Double], Double, atan2))
        .with_function(FunctionMeta::new("sinh", &[Double], Double, sinh))
        .with_function(FunctionMeta::new("cosh", &[Double], Double, cosh))
        .with_function(FunctionMeta::new("tanh", &[Double], Double, tanh))
        .with_function(FunctionMeta::new("radians", &[Double], Double, radians))
        .with_function(FunctionMeta::new("degrees", &[Double], Double, degrees))
        .with_constant("PI", Value::Number(consts::PI))
}

// --- text ---

fn len(args: &[Arg]) -> BuiltinResult {
    let [Arg::Str(s)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Int(s.chars().count() as i64))
}

fn upper(args: &[Arg]) -> BuiltinResult {
    let [Arg::Str(s)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Str(s.to_uppercase()))
}

fn lower(args: &[Arg]) -> BuiltinResult {
    let [Arg::Str(s)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Str(s.to_lowercase()))
}

fn reverse(args: &[Arg]) -> BuiltinResult {
    let [Arg::Str(s)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Str(s.chars().rev().collect()))
}

/// Largest string, in bytes, `repeat` will build.
pub const MAX_REPEAT_BYTES: usize = 1 << 24;

fn repeat(args: &[Arg]) -> BuiltinResult {
    let [Arg::Str(s), Arg::Int(times)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    let Ok(count) = usize::try_from(*times) else {
        return domain_error("repeat", format_args!("count {} is negative", times));
    };
    match s.len().checked_mul(count) {
        Some(bytes) if bytes <= MAX_REPEAT_BYTES => Ok(Arg::Str(s.repeat(count))),
        _ => domain_error(
            "repeat",
            format_args!("result exceeds {} bytes", MAX_REPEAT_BYTES),
        ),
    }
}

fn contains(args: &[Arg]) -> BuiltinResult {
    let [Arg::Str(haystack), Arg::Str(needle)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    flag(haystack.contains(needle.as_str()))
}

fn concat(args: &[Arg]) -> BuiltinResult {
    let [Arg::StrArray(parts)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Str(parts.concat()))
}

fn join(args: &[Arg]) -> BuiltinResult {
    let [Arg::Str(separator), Arg::StrArray(parts)] = args else {
        return Err(BuiltinError::Mismatch);
    };
    Ok(Arg::Str(parts.join(separator)))
}

pub fn text_module() -> Module {
    use Kind::{Int, Str, StrArray};
    Module::new("text")
        .with_function(FunctionMeta::new("len", &[Str], Int, len))
        .with_function(FunctionMeta::new("upper", &[Str], Str, upper))
        .with_function(FunctionMeta::new("lower", &[Str], Str, lower))
        .with_function(FunctionMeta::new("reverse", &[Str], Str, reverse))
        .with_function(FunctionMeta::new("repeat", &[Str, Int], Str, repeat))
        .with_function(FunctionMeta::new("contains", &[Str, Str], Int, contains))
        .with_function(FunctionMeta::new("concat", &[StrArray], Str, concat))
        .with_function(FunctionMeta::new("join", &[Str, StrArray], Str, join))
}
