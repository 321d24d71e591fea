use crate::source::Span;
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String, Span), // Symbol name, span where lookup happened
}

/// One scope: a map from identifier to value with unique keys.
///
/// A scope does not know its parent. Name resolution is always
/// `[innermost, root]`, see [`lookup`] and [`lookup_mut`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    bindings: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// Defines a variable in this scope, replacing an existing binding of the same name.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.bindings.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Gets a list of all identifiers in this scope
    pub fn names(&self) -> HashSet<String> {
        self.bindings.keys().cloned().collect()
    }

    /// Bindings ordered by name, for stable dumps.
    pub fn sorted(&self) -> Vec<(&str, &Value)> {
        let mut entries: Vec<(&str, &Value)> = self
            .bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Resolves `name` in the innermost scope, then the root. `None` for the
/// innermost scope means the root is innermost.
pub fn lookup<'a>(local: Option<&'a Scope>, root: &'a Scope, name: &str) -> Option<&'a Value> {
    local
        .and_then(|scope| scope.get(name))
        .or_else(|| root.get(name))
}

/// Mutable counterpart of [`lookup`]; the binding found is the one in the
/// innermost scope that defines `name`.
pub fn lookup_mut<'a>(
    local: Option<&'a mut Scope>,
    root: &'a mut Scope,
    name: &str,
    span: Span,
) -> Result<&'a mut Value, EnvError> {
    let scope = match local {
        Some(scope) if scope.contains(name) => scope,
        _ => root,
    };
    scope
        .get_mut(name)
        .ok_or_else(|| EnvError::UndefinedVariable(name.to_string(), span))
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_define_and_get() {
        let mut scope = Scope::new();
        scope.define("x", num(10.0));
        assert_eq!(scope.get("x"), Some(&num(10.0)));
        assert_eq!(scope.get("y"), None);

        scope.define("x", num(11.0));
        assert_eq!(scope.get("x"), Some(&num(11.0)));
        assert_eq!(scope.names().len(), 1);
    }

    #[test]
    fn test_lookup_prefers_innermost() {
        let mut root = Scope::new();
        root.define("x", num(1.0));
        root.define("g", num(7.0));
        let mut local = Scope::new();
        local.define("x", num(50.0));

        assert_eq!(lookup(Some(&local), &root, "x"), Some(&num(50.0)));
        assert_eq!(lookup(Some(&local), &root, "g"), Some(&num(7.0)));
        assert_eq!(lookup(None, &root, "x"), Some(&num(1.0)));
        assert_eq!(lookup(Some(&local), &root, "missing"), None);
    }

    #[test]
    fn test_lookup_mut_updates_defining_scope() {
        let mut root = Scope::new();
        root.define("x", num(1.0));
        root.define("g", num(7.0));
        let mut local = Scope::new();
        local.define("x", num(50.0));

        *lookup_mut(Some(&mut local), &mut root, "x", Span::default()).unwrap() = num(51.0);
        *lookup_mut(Some(&mut local), &mut root, "g", Span::default()).unwrap() = num(8.0);

        assert_eq!(local.get("x"), Some(&num(51.0)));
        assert_eq!(root.get("x"), Some(&num(1.0)));
        assert_eq!(root.get("g"), Some(&num(8.0)));
        assert!(!local.contains("g"));
    }

    #[test]
    fn test_lookup_mut_unbound() {
        let mut root = Scope::new();
        let span = Span::new(11, 12);
        let result = lookup_mut(None, &mut root, "z", span);
        assert_eq!(
            result,
            Err(EnvError::UndefinedVariable("z".to_string(), span))
        );
    }

    #[test]
    fn test_sorted_and_names() {
        let mut scope = Scope::new();
        scope.define("b", num(2.0));
        scope.define("a", Value::Str("s".to_string()));
        let names: Vec<&str> = scope.sorted().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(scope.names().contains("b"));
    }
}
