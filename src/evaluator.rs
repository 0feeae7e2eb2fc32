use crate::environment::{EnvError, Environment};
use crate::error::CarlaeError;
use crate::parser::parse_str;
use crate::source::Span;
use crate::types::{Closure, Node, Sexpr, Value};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("Expected a function, but got: {found}")]
    NotAProcedure { found: String, span: Span },
    #[error("Invalid arguments - {0}")]
    InvalidArguments(String, Span),
    #[error("{callee} expects {expected} argument(s), got {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("Type mismatch - expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        span: Span,
    },
    #[error("Division by zero")]
    DivisionByZero(Span),
    #[error("Invalid special form - {0}")]
    InvalidSpecialForm(String, Span),
    #[error("Cannot evaluate an empty list")]
    EmptyApplication(Span),
    #[error("Maximum call depth of {limit} exceeded")]
    RecursionLimit { limit: usize, span: Span },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::EnvError(EnvError::UnboundVariable(_, span))
            | EvalError::NotAProcedure { span, .. }
            | EvalError::InvalidArguments(_, span)
            | EvalError::ArityMismatch { span, .. }
            | EvalError::TypeMismatch { span, .. }
            | EvalError::DivisionByZero(span)
            | EvalError::InvalidSpecialForm(_, span)
            | EvalError::EmptyApplication(span)
            | EvalError::RecursionLimit { span, .. } => *span,
        }
    }
}

pub type EvalResult<T = Value> = Result<T, EvalError>;

pub const TRUE: &str = "@t";
pub const FALSE: &str = "@f";

/// Keywords recognised by their position at the head of a list. They are
/// matched on the raw symbol before anything is looked up, so rebinding one
/// as a variable never changes how a form headed by it evaluates.
pub const SPECIAL_FORMS: [&str; 3] = ["def", "fun", "if"];

pub fn special_form_identifiers() -> HashSet<String> {
    SPECIAL_FORMS.iter().map(|s| s.to_string()).collect()
}

// --- Call depth ---

/// Closure calls nest on the host stack, so deep recursion is bounded here
/// instead of by a stack overflow that would take the whole process down.
/// Sized to fit the 2 MiB stack of a default spawned thread in a debug build.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 160;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_CALL_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_CALL_DEPTH) };
}

/// Sets the closure call depth limit for evaluations on the current thread.
pub fn set_max_call_depth(limit: usize) {
    MAX_CALL_DEPTH.with(|max| max.set(limit));
}

pub fn max_call_depth() -> usize {
    MAX_CALL_DEPTH.with(Cell::get)
}

struct CallGuard;

impl CallGuard {
    fn enter(span: Span) -> EvalResult<CallGuard> {
        let limit = max_call_depth();
        CALL_DEPTH.with(|depth| {
            if depth.get() >= limit {
                return Err(EvalError::RecursionLimit { limit, span });
            }
            depth.set(depth.get() + 1);
            Ok(CallGuard)
        })
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
pub fn evaluate(node: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
    match &node.kind {
        Sexpr::Number(n) => Ok(Value::Number(*n)),

        Sexpr::Symbol(name) => match name.as_str() {
            TRUE => Ok(Value::Boolean(true)),
            FALSE => Ok(Value::Boolean(false)),
            _ => Ok(env.borrow().get(name, node.span)?),
        },

        Sexpr::List(elements) => match elements.split_first() {
            None => Err(EvalError::EmptyApplication(node.span)),
            // Special forms are checked before the head is ever evaluated
            Some((first, rest)) => match first.as_symbol() {
                Some("fun") => evaluate_fun(rest, env, node.span),
                Some("def") => evaluate_def(rest, env, node.span),
                Some("if") => evaluate_if(rest, env, node.span),
                _ => evaluate_procedure(first, rest, env, node.span),
            },
        },
    }
}

/// Tokenizes, parses and evaluates one line of source.
///
/// With no environment a fresh session scope is created below the builtins.
/// The environment is always handed back so that definitions can be carried
/// over to the next line.
pub fn evaluate_top_level(
    source: &str,
    env: Option<Rc<RefCell<Environment>>>,
) -> Result<(Value, Rc<RefCell<Environment>>), CarlaeError> {
    let env = env.unwrap_or_else(Environment::new_global);
    let node = parse_str(source)?;
    let value = evaluate(&node, &env)?;
    Ok((value, env))
}

fn evaluate_procedure(
    operator: &Node,
    operands: &[Node],
    env: &Rc<RefCell<Environment>>,
    span: Span,
) -> EvalResult {
    let procedure = evaluate(operator, env)?;

    let mut evaluated_args: Vec<Value> = Vec::with_capacity(operands.len());
    for operand_node in operands {
        evaluated_args.push(evaluate(operand_node, env)?);
    }

    if matches!(procedure, Value::Number(_) | Value::Boolean(_)) {
        return Err(EvalError::NotAProcedure {
            found: procedure.to_string(),
            span: operator.span,
        });
    }
    apply(&procedure, &evaluated_args, span)
}

/// Calls a function value with already evaluated arguments.
pub fn apply(procedure: &Value, args: &[Value], span: Span) -> EvalResult {
    match procedure {
        Value::Primitive(primitive) => {
            trace!("calling builtin '{}' with {} argument(s)", primitive.name, args.len());
            (primitive.func)(args, span)
        }
        Value::Closure(closure) => {
            if closure.params.len() != args.len() {
                return Err(EvalError::ArityMismatch {
                    callee: describe_closure(closure),
                    expected: closure.params.len(),
                    found: args.len(),
                    span,
                });
            }
            let _guard = CallGuard::enter(span)?;
            trace!("calling {} with {} argument(s)", describe_closure(closure), args.len());

            let frame = Environment::new_enclosed(closure.env.clone());
            {
                let mut frame = frame.borrow_mut();
                for (param, arg) in closure.params.iter().zip(args) {
                    frame.define(param.clone(), arg.clone());
                }
            }
            evaluate(&closure.body, &frame)
        }
        Value::Number(_) | Value::Boolean(_) => Err(EvalError::NotAProcedure {
            found: procedure.to_string(),
            span,
        }),
    }
}

fn describe_closure(closure: &Closure) -> String {
    match &closure.name {
        Some(name) => format!("function '{}'", name),
        None => "anonymous function".to_string(),
    }
}

/// (fun (p1 p2 ...) body)
fn evaluate_fun(operands: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    let [params, body] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "fun expects a parameter list and a body".to_string(),
            span,
        ));
    };
    let Sexpr::List(param_nodes) = &params.kind else {
        return Err(EvalError::InvalidSpecialForm(
            format!("fun expects a parameter list, got a {}", params.kind.type_name()),
            params.span,
        ));
    };
    make_closure(None, param_nodes, body, env)
}

/// (def name value) or (def (name p1 p2 ...) body)
fn evaluate_def(operands: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    let [target, value_node] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "def expects a name and a value".to_string(),
            span,
        ));
    };
    match &target.kind {
        Sexpr::Symbol(name) => {
            check_bindable(name, target.span)?;
            let value = evaluate(value_node, env)?;
            if env.borrow().is_bound_locally(name) {
                debug!("redefining {}", name);
            }
            debug!("def {} = {}", name, value);
            env.borrow_mut().define(name.clone(), value.clone());
            Ok(value)
        }
        Sexpr::List(signature) => {
            let Some((name_node, param_nodes)) = signature.split_first() else {
                return Err(EvalError::InvalidSpecialForm(
                    "def needs a function name".to_string(),
                    target.span,
                ));
            };
            let name = expect_symbol(name_node)?;
            check_bindable(name, name_node.span)?;
            let closure = make_closure(Some(name), param_nodes, value_node, env)?;
            if env.borrow().is_bound_locally(name) {
                debug!("redefining {}", name);
            }
            debug!("def function {} ({} parameter(s))", name, param_nodes.len());
            env.borrow_mut().define(name, closure.clone());
            Ok(closure)
        }
        Sexpr::Number(_) => Err(EvalError::InvalidSpecialForm(
            format!("cannot define a {}", target.kind.type_name()),
            target.span,
        )),
    }
}

/// (if condition consequent alternative), evaluating only the taken branch.
fn evaluate_if(operands: &[Node], env: &Rc<RefCell<Environment>>, span: Span) -> EvalResult {
    let [condition, consequent, alternative] = operands else {
        return Err(EvalError::InvalidSpecialForm(
            "if expects a condition, a consequent and an alternative".to_string(),
            span,
        ));
    };
    if evaluate(condition, env)?.is_truthy() {
        evaluate(consequent, env)
    } else {
        evaluate(alternative, env)
    }
}

fn make_closure(
    name: Option<&str>,
    param_nodes: &[Node],
    body: &Node,
    env: &Rc<RefCell<Environment>>,
) -> EvalResult {
    let mut params: Vec<String> = Vec::with_capacity(param_nodes.len());
    for node in param_nodes {
        let param = expect_symbol(node)?;
        check_bindable(param, node.span)?;
        if params.iter().any(|p| p == param) {
            return Err(EvalError::InvalidSpecialForm(
                format!("duplicate parameter '{}'", param),
                node.span,
            ));
        }
        params.push(param.to_string());
    }
    Ok(Value::Closure(Rc::new(Closure {
        name: name.map(str::to_string),
        params,
        body: body.clone(),
        env: env.clone(),
    })))
}

fn expect_symbol(node: &Node) -> EvalResult<&str> {
    node.as_symbol().ok_or_else(|| {
        EvalError::InvalidSpecialForm(
            format!("expected a name, got a {}", node.kind.type_name()),
            node.span,
        )
    })
}

// `@t` and `@f` are literals, never looked up, so a binding for them could
// never be read back.
fn check_bindable(name: &str, span: Span) -> EvalResult<()> {
    if name == TRUE || name == FALSE {
        Err(EvalError::InvalidSpecialForm(
            format!("cannot bind the boolean literal {}", name),
            span,
        ))
    } else {
        Ok(())
    }
}
