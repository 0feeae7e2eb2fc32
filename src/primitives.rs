use std::collections::HashMap;
use std::sync::OnceLock;

use crate::{EvalError, EvalResult, Span};
use crate::types::{Primitive, PrimitiveFunc, Value};

/// The fixed table of native operators every session environment falls back to.
///
/// Built once per process and never mutated afterwards; sessions reference it
/// rather than copying it into their own frames.
#[derive(Debug)]
pub struct Builtins {
    table: HashMap<&'static str, Primitive>,
}

static BUILTINS: OnceLock<Builtins> = OnceLock::new();

impl Builtins {
    pub fn global() -> &'static Builtins {
        BUILTINS.get_or_init(|| {
            let mut builtins = Builtins {
                table: HashMap::new(),
            };
            builtins.add_primitive("+", prim_add);
            builtins.add_primitive("-", prim_sub);
            builtins.add_primitive("*", prim_mul);
            builtins.add_primitive("/", prim_div);
            builtins
        })
    }

    fn add_primitive(&mut self, name: &'static str, func: PrimitiveFunc) {
        self.table.insert(name, Primitive { name, func });
    }

    pub fn get(&self, name: &str) -> Option<&Primitive> {
        self.table.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }
}

fn expect_number(value: &Value, span: Span) -> EvalResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::TypeMismatch {
            expected: "number",
            found: other.type_name(),
            span,
        }),
    }
}

/// Left fold over one or more numbers: `((a op b) op c) ...`.
fn fold_numbers<F: Fn(f64, f64) -> EvalResult<f64>>(
    args: &[Value],
    span: Span,
    operator: &str,
    func: F,
) -> EvalResult {
    let Some((first, rest)) = args.split_first() else {
        return Err(EvalError::InvalidArguments(
            format!("Primitive '{}' expects at least 1 argument, got 0", operator),
            span,
        ));
    };
    let mut acc = expect_number(first, span)?;
    for arg in rest {
        acc = func(acc, expect_number(arg, span)?)?;
    }
    Ok(Value::Number(acc))
}

pub fn prim_add(args: &[Value], span: Span) -> EvalResult {
    // (+ 1 2 3) -> 6
    fold_numbers(args, span, "+", |acc, val| Ok(acc + val))
}

pub fn prim_sub(args: &[Value], span: Span) -> EvalResult {
    // (- 10 3 2) -> 5, (- 4) -> 4
    fold_numbers(args, span, "-", |acc, val| Ok(acc - val))
}

pub fn prim_mul(args: &[Value], span: Span) -> EvalResult {
    fold_numbers(args, span, "*", |acc, val| Ok(acc * val))
}

pub fn prim_div(args: &[Value], span: Span) -> EvalResult {
    // (/ 20 2 5) -> 2
    fold_numbers(args, span, "/", |acc, val| {
        if val == 0.0 {
            Err(EvalError::DivisionByZero(span))
        } else {
            Ok(acc / val)
        }
    })
}
