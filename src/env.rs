//! Variable lookup for rendering a parsed template.
//!
//! Nothing here is used while parsing. Identifier nodes name variables that an
//! evaluator resolves through an [`Environment`], falling back to enclosing
//! scopes.

use std::collections::HashMap;

/// What a template variable can hold: text for `{{name}}`, or anything an
/// `{{if name}}` can test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Bool(bool),
    List(Vec<Value>),
}

/// A scope of named values with an optional enclosing scope.
///
/// Values default to [`Value`] but any type works; an evaluator with its own
/// value model can use `Environment<'_, MyValue>`.
#[derive(Debug)]
pub struct Environment<'p, V = Value> {
    contents: HashMap<String, V>,
    parent: Option<&'p Environment<'p, V>>,
}

impl Value {
    /// Whether an `if` on this value takes its true branch. Empty text and
    /// empty lists are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Text(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }

    /// The text an identifier tag interpolates, if the value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl<'p, V> Environment<'p, V> {
    pub fn new() -> Self {
        Self {
            contents: HashMap::with_capacity(8),
            parent: None,
        }
    }

    /// A new, empty scope whose misses fall through to `self`.
    pub fn child(&'p self) -> Environment<'p, V> {
        Environment {
            contents: HashMap::with_capacity(8),
            parent: Some(self),
        }
    }

    /// Looks `name` up here, then in each enclosing scope.
    pub fn get(&self, name: &str) -> Option<&V> {
        match self.contents.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|parent| parent.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Binds `name` in this scope, shadowing any outer binding. Returns the
    /// value it replaced in this scope, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<V>) -> Option<V> {
        self.contents.insert(name.into(), value.into())
    }
}

impl Environment<'_, Value> {
    /// Whether `{{if name}}` takes its true branch. Unbound names are false.
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(Value::is_truthy)
    }
}

impl<V> Default for Environment<'_, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_parent() {
        let mut globals: Environment = Environment::new();
        globals.insert("title", "Home");
        globals.insert("flag", true);

        let mut local = globals.child();
        local.insert("flag", false);

        assert_eq!(local.get("title"), Some(&Value::from("Home")));
        assert_eq!(local.get("flag"), Some(&Value::Bool(false)));
        assert_eq!(globals.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(local.get("missing"), None);
        assert!(!local.contains("missing"));
    }

    #[test]
    fn lookup_walks_several_scopes() {
        let mut outer: Environment = Environment::new();
        outer.insert("x", "outer");
        let middle = outer.child();
        let inner = middle.child();

        assert_eq!(inner.get("x").and_then(Value::as_text), Some("outer"));
    }

    #[test]
    fn if_conditions_read_through_scopes() {
        let mut outer: Environment = Environment::new();
        outer.insert("items", vec![Value::from("a")]);
        outer.insert("empty", "");
        let inner = outer.child();

        assert!(inner.is_truthy("items"));
        assert!(!inner.is_truthy("empty"));
        assert!(!inner.is_truthy("unbound"));
    }

    #[test]
    fn truthiness() {
        assert!(Value::from("a").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from(vec![Value::Bool(false)]).is_truthy());
        assert_eq!(Value::Bool(true).as_text(), None);
    }

    #[test]
    fn other_value_types() {
        let mut globals: Environment<'_, u32> = Environment::default();
        globals.insert("count", 3u32);
        assert_eq!(globals.child().get("count"), Some(&3));
    }
}
