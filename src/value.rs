use std::fmt;

/// A runtime value. Booleans are numbers (0 or 1).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Nil,
}

impl Value {
    pub fn from_bool(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "num",
            Value::Str(_) => "str",
            Value::Nil => "nil",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Nil => false,
        }
    }

    /// The text `print` emits for this value. An absent result reads as zero.
    pub fn coerce_string(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Nil => format_number(0.0),
        }
    }
}

/// Shortest decimal that parses back to the same `f64`.
pub fn format_number(n: f64) -> String {
    n.to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Nil => write!(f, "nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortest_round_trip_formatting() {
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(-7.0), "-7");
        for n in [0.1, 1.0 / 3.0, 123456.789, 1e-7, 6.02e23] {
            assert_eq!(format_number(n).parse::<f64>().unwrap(), n);
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Number(2.0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Str("x".to_string()).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert_eq!(Value::from_bool(true), Value::Number(1.0));
    }

    #[test]
    fn test_coercion_and_display() {
        assert_eq!(Value::Str("hi".to_string()).coerce_string(), "hi");
        assert_eq!(Value::Str("hi".to_string()).to_string(), "\"hi\"");
        assert_eq!(Value::Nil.coerce_string(), "0");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Number(1.5).type_name(), "num");
    }
}
