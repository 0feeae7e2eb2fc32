use crate::primitives::Builtins;
use crate::source::Span;
use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Unbound variable: '{0}'")]
    UnboundVariable(String, Span), // Symbol name, span where lookup happened
}

/// Where lookup continues once a frame has no binding for a name.
#[derive(Debug, Clone)]
enum Outer {
    /// The process-wide builtin table. It has no parent of its own.
    Builtins(&'static Builtins),
    Frame(Rc<RefCell<Environment>>),
}

#[derive(Debug, Clone)]
pub struct Environment {
    outer: Option<Outer>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates an environment with no parent at all, not even the builtins.
    pub fn new() -> Rc<RefCell<Self>> {
        Self::with_outer(None)
    }

    /// Creates a session's root environment, enclosed by the builtin registry.
    pub fn new_global() -> Rc<RefCell<Self>> {
        Self::with_outer(Some(Outer::Builtins(Builtins::global())))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Self::with_outer(Some(Outer::Frame(outer_env)))
    }

    fn with_outer(outer: Option<Outer>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer,
            bindings: HashMap::new(),
        }))
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a variable's value, innermost frame first.
    /// `lookup_span` is where the variable was referenced, for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Value, EnvError> {
        self.lookup(name)
            .ok_or_else(|| EnvError::UnboundVariable(name.to_string(), lookup_span))
    }

    /// Like [`Environment::get`] but distinguishes only bound from unbound.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value.clone());
        }
        match &self.outer {
            Some(Outer::Frame(outer_env)) => outer_env.borrow().lookup(name),
            Some(Outer::Builtins(builtins)) => builtins.get(name).copied().map(Value::Primitive),
            None => None,
        }
    }

    /// Whether `name` is bound in this frame, ignoring enclosing ones.
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Gets every identifier visible from this environment.
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        match &self.outer {
            Some(Outer::Frame(outer_env)) => identifiers.extend(outer_env.borrow().get_identifiers()),
            Some(Outer::Builtins(builtins)) => {
                identifiers.extend(builtins.names().map(str::to_string))
            }
            None => {}
        }
        identifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.borrow_mut().define("x", num(10.0));
        assert_eq!(env.borrow().get("x", Span::default()), Ok(num(10.0)));
    }

    #[test]
    fn test_get_unbound() {
        let env = Environment::new();
        let span = Span::new(11, 12);
        assert_eq!(
            env.borrow().get("z", span),
            Err(EnvError::UnboundVariable("z".to_string(), span))
        );
    }

    #[test]
    fn test_falsy_bindings_are_still_bound() {
        let env = Environment::new();
        env.borrow_mut().define("zero", num(0.0));
        env.borrow_mut().define("no", Value::Boolean(false));
        let child = Environment::new_enclosed(env);
        assert_eq!(child.borrow().get("zero", Span::default()), Ok(num(0.0)));
        assert_eq!(
            child.borrow().get("no", Span::default()),
            Ok(Value::Boolean(false))
        );
    }

    #[test]
    fn test_lookup_through_several_levels() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x", num(10.0));
        let middle = Environment::new_enclosed(global_env);
        let inner = Environment::new_enclosed(middle.clone());
        let innermost = Environment::new_enclosed(inner);

        assert_eq!(innermost.borrow().get("x", Span::default()), Ok(num(10.0)));
        assert!(innermost.borrow().get("y", Span::default()).is_err());
    }

    #[test]
    fn test_shadowing_does_not_touch_parent() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x", num(10.0));

        let local_env = Environment::new_enclosed(global_env.clone());
        local_env.borrow_mut().define("x", num(50.0));
        assert!(local_env.borrow().is_bound_locally("x"));

        assert_eq!(local_env.borrow().get("x", Span::default()), Ok(num(50.0)));
        assert_eq!(global_env.borrow().get("x", Span::default()), Ok(num(10.0)));
    }

    #[test]
    fn test_redefine_overwrites() {
        let env = Environment::new();
        env.borrow_mut().define("x", num(1.0));
        env.borrow_mut().define("x", Value::Boolean(true));
        assert_eq!(
            env.borrow().get("x", Span::default()),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_global_sees_builtins() {
        let env = Environment::new_global();
        let child = Environment::new_enclosed(env.clone());
        assert!(matches!(
            child.borrow().get("+", Span::default()),
            Ok(Value::Primitive(p)) if p.name == "+"
        ));
        // Builtins can be shadowed by a session without affecting other sessions
        env.borrow_mut().define("+", num(0.0));
        assert_eq!(env.borrow().get("+", Span::default()), Ok(num(0.0)));
        let other = Environment::new_global();
        assert!(matches!(
            other.borrow().get("+", Span::default()),
            Ok(Value::Primitive(_))
        ));
        // A bare environment has no builtins
        assert!(Environment::new().borrow().get("+", Span::default()).is_err());
    }

    #[test]
    fn test_get_identifiers() {
        let env = Environment::new_global();
        env.borrow_mut().define("answer", num(42.0));
        let child = Environment::new_enclosed(env);
        child.borrow_mut().define("local", num(1.0));
        let identifiers = child.borrow().get_identifiers();
        for name in ["answer", "local", "+", "-", "*", "/"] {
            assert!(identifiers.contains(name), "missing {}", name);
        }
    }
}
