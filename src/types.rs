use crate::environment::Environment;
use crate::evaluator::EvalResult;
use crate::source::Span;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Sexpr, // The S-expression itself
    pub span: Span,  // The source span it covers
}

impl Node {
    pub fn new(kind: Sexpr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_number(n: f64, span: Span) -> Self {
        Node::new(Sexpr::Number(n), span)
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::Symbol(name.into()), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::List(elements), span)
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            Sexpr::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// The parsed form of Carlae source. There are no strings, pairs or quoted
/// forms: lists only ever appear as code.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    Number(f64),
    Symbol(String),  // identifiers, `@t`/`@f` and special-form keywords
    List(Vec<Node>), // (+ 1 2), (def x 10), ()
}

impl Sexpr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Sexpr::Number(_) => "number",
            Sexpr::Symbol(_) => "symbol",
            Sexpr::List(_) => "list",
        }
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Number(n) => write!(f, "{}", n),
            Sexpr::Symbol(s) => write!(f, "{}", s),
            Sexpr::List(list) => {
                write!(f, "(")?;
                for (i, node) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", node)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub type PrimitiveFunc = fn(&[Value], Span) -> EvalResult;

/// A native operator from the builtin registry.
#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub func: PrimitiveFunc,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({})", self.name)
    }
}

/// A user-defined function together with the environment it was created in.
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Node,
    pub env: Rc<RefCell<Environment>>,
}

// The captured environment usually binds the closure itself, so it is left out
// to keep `{:?}` from recursing forever.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("body", &self.body.to_string())
            .finish_non_exhaustive()
    }
}

/// Runtime values produced by the evaluator.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    Primitive(Primitive),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Primitive(_) | Value::Closure(_) => "function",
        }
    }

    /// `@f`, zero and NaN are false; every other value is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Primitive(_) | Value::Closure(_) => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Primitive(a), Value::Primitive(b)) => a.name == b.name,
            // Functions are equal only to themselves
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "@t" } else { "@f" }),
            Value::Primitive(_) => write!(f, "builtin function"),
            Value::Closure(_) => write!(f, "function object"),
        }
    }
}
