//! Built-in operations registry.
//!
//! Every primitive is a plain function with the [`BuiltinFn`] signature, listed once in
//! a static registry. The evaluator binds each registry entry into the global frame
//! under its name, so builtins are ordinary values that can be passed around,
//! stored and partially shadowed like any other binding.
//!
//! ```text
//! (+ 1 2 3)            ; arithmetic, also as add sub mul div
//! (head {1 2 3})       ; list operations on Q-expressions
//! (def {x y} 1 2)      ; definitions in the global frame
//! (\ {a b} {+ a b})    ; closures
//! ```
//!
//! ## Error Handling
//!
//! Builtins validate argument count and types before acting and return an error
//! value on violation. Arguments are owned by the builtin and dropped on every path,
//! including the failing ones.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature `fn(&Evaluator, &Environment, Vec<Value>) -> Value`
//! 2. **Add it to `BUILTIN_OPS`** under the symbol it should be bound to
//! 3. **Add tests** covering the success path and each validation failure

use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::value::{Builtin, BuiltinFn, Closure, VARIADIC_MARKER, Value};
use crate::{ErrorKind, LispError};
use std::collections::HashMap;
use std::sync::LazyLock;

//
// Validation helpers
//

fn check_count(name: &str, args: &[Value], expected: usize) -> Result<(), LispError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(LispError::argument_count(name, args.len(), expected))
    }
}

fn into_qexpr_cells(name: &str, index: usize, value: Value) -> Result<Vec<Value>, LispError> {
    match value {
        Value::QExpr(cells) => Ok(cells),
        other => Err(LispError::argument_type(
            name,
            index,
            other.type_name(),
            "Q-Expression",
        )),
    }
}

/// Exactly one Q-expression argument, returned as its cells
fn single_qexpr(name: &str, args: Vec<Value>) -> Result<Vec<Value>, LispError> {
    check_count(name, &args, 1)?;
    let mut args = args.into_iter();
    match args.next() {
        Some(arg) => into_qexpr_cells(name, 0, arg),
        None => Err(LispError::argument_count(name, 0, 1)),
    }
}

fn non_empty(name: &str, cells: Vec<Value>) -> Result<Vec<Value>, LispError> {
    if cells.is_empty() {
        Err(LispError::empty_list(name))
    } else {
        Ok(cells)
    }
}

/// Unwrap a Q-expression of symbols into their names
fn symbol_names(
    cells: Vec<Value>,
    non_symbol: impl Fn(&Value) -> LispError,
) -> Result<Vec<String>, LispError> {
    cells
        .into_iter()
        .map(|cell| match cell {
            Value::Symbol(name) => Ok(name),
            other => Err(non_symbol(&other)),
        })
        .collect()
}

/// A `&` marker must be followed by exactly one symbol, and nothing after it
pub(crate) fn validate_formals(formals: &[String]) -> Result<(), LispError> {
    match formals.iter().position(|f| f == VARIADIC_MARKER) {
        Some(pos) if formals.len() != pos + 2 || formals[pos + 1] == VARIADIC_MARKER => {
            Err(LispError::invalid_formals())
        }
        _ => Ok(()),
    }
}

//
// Arithmetic
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Min,
    Max,
}

#[expect(clippy::cast_precision_loss)]
fn apply_numeric(name: &str, op: NumOp, x: Value, y: Value) -> Result<Value, LispError> {
    let (a, b) = match (x, y) {
        (Value::Int(a), Value::Int(b)) => return apply_int(name, op, a, b),
        (Value::Int(a), Value::Float(b)) => (a as f64, b),
        (Value::Float(a), Value::Int(b)) => (a, b as f64),
        (Value::Float(a), Value::Float(b)) => (a, b),
        (x, y) => {
            let bad = if x.is_number() { y } else { x };
            return Err(LispError::new(
                ErrorKind::ArgumentType,
                format!("Function '{name}' cannot operate on {}.", bad.type_name()),
            ));
        }
    };
    apply_float(op, a, b)
}

#[expect(clippy::cast_precision_loss)]
fn apply_int(name: &str, op: NumOp, a: i64, b: i64) -> Result<Value, LispError> {
    let result = match op {
        NumOp::Add => a.checked_add(b),
        NumOp::Sub => a.checked_sub(b),
        NumOp::Mul => a.checked_mul(b),
        NumOp::Div | NumOp::Rem if b == 0 => return Err(LispError::division_by_zero()),
        NumOp::Div => a.checked_div(b),
        NumOp::Rem => a.checked_rem(b),
        // Negative exponents leave the integers
        NumOp::Pow if b < 0 => return Ok(Value::Float((a as f64).powf(b as f64))),
        NumOp::Pow => match (a, u32::try_from(b)) {
            (_, Ok(exp)) => a.checked_pow(exp),
            // Exponents past u32 still have exact results for these bases
            (0 | 1, Err(_)) => Some(a),
            (-1, Err(_)) => Some(if b % 2 == 0 { 1 } else { -1 }),
            _ => None,
        },
        NumOp::Min => Some(a.min(b)),
        NumOp::Max => Some(a.max(b)),
    };
    result
        .map(Value::Int)
        .ok_or_else(|| LispError::integer_overflow(name))
}

fn apply_float(op: NumOp, a: f64, b: f64) -> Result<Value, LispError> {
    let result = match op {
        NumOp::Add => a + b,
        NumOp::Sub => a - b,
        NumOp::Mul => a * b,
        NumOp::Div if b == 0.0 => return Err(LispError::division_by_zero()),
        NumOp::Div => a / b,
        NumOp::Rem => return Err(LispError::non_integer_modulo()),
        NumOp::Pow => a.powf(b),
        NumOp::Min => a.min(b),
        NumOp::Max => a.max(b),
    };
    Ok(Value::Float(result))
}

fn negate(name: &str, x: Value) -> Result<Value, LispError> {
    match x {
        Value::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| LispError::integer_overflow(name)),
        Value::Float(x) => Ok(Value::Float(-x)),
        other => Err(LispError::argument_type(name, 0, other.type_name(), "Number")),
    }
}

/// Left fold over numeric arguments; unary subtraction negates
fn fold_numbers(name: &str, op: NumOp, args: Vec<Value>) -> Result<Value, LispError> {
    if let Some((index, bad)) = args.iter().enumerate().find(|(_, arg)| !arg.is_number()) {
        return Err(LispError::argument_type(name, index, bad.type_name(), "Number"));
    }

    let mut args = args.into_iter().peekable();
    let Some(first) = args.next() else {
        return Err(LispError::argument_count(name, 0, 1));
    };

    if op == NumOp::Sub && args.peek().is_none() {
        return negate(name, first);
    }

    args.try_fold(first, |acc, y| apply_numeric(name, op, acc, y))
}

// Macro to generate the arithmetic builtins and their aliases
macro_rules! arithmetic_builtin {
    ($name:ident, $symbol:expr, $op:expr) => {
        fn $name(_: &Evaluator, _: &Environment, args: Vec<Value>) -> Value {
            fold_numbers($symbol, $op, args).unwrap_or_else(Value::from)
        }
    };
}

arithmetic_builtin!(builtin_add, "+", NumOp::Add);
arithmetic_builtin!(builtin_sub, "-", NumOp::Sub);
arithmetic_builtin!(builtin_mul, "*", NumOp::Mul);
arithmetic_builtin!(builtin_div, "/", NumOp::Div);
arithmetic_builtin!(builtin_rem, "%", NumOp::Rem);
arithmetic_builtin!(builtin_pow, "pow", NumOp::Pow);
arithmetic_builtin!(builtin_min, "min", NumOp::Min);
arithmetic_builtin!(builtin_max, "max", NumOp::Max);
arithmetic_builtin!(builtin_add_named, "add", NumOp::Add);
arithmetic_builtin!(builtin_sub_named, "sub", NumOp::Sub);
arithmetic_builtin!(builtin_mul_named, "mul", NumOp::Mul);
arithmetic_builtin!(builtin_div_named, "div", NumOp::Div);

//
// List operations
//

/// Relabel the argument S-expression as a Q-expression
fn builtin_list(_: &Evaluator, _: &Environment, args: Vec<Value>) -> Value {
    Value::QExpr(args)
}

fn builtin_head(_: &Evaluator, _: &Environment, args: Vec<Value>) -> Value {
    single_qexpr("head", args)
        .and_then(|cells| non_empty("head", cells))
        .map(|mut cells| {
            cells.truncate(1);
            Value::QExpr(cells)
        })
        .unwrap_or_else(Value::from)
}

fn builtin_tail(_: &Evaluator, _: &Environment, args: Vec<Value>) -> Value {
    single_qexpr("tail", args)
        .and_then(|cells| non_empty("tail", cells))
        .map(|mut cells| {
            cells.remove(0);
            Value::QExpr(cells)
        })
        .unwrap_or_else(Value::from)
}

fn builtin_init(_: &Evaluator, _: &Environment, args: Vec<Value>) -> Value {
    single_qexpr("init", args)
        .and_then(|cells| non_empty("init", cells))
        .map(|mut cells| {
            cells.pop();
            Value::QExpr(cells)
        })
        .unwrap_or_else(Value::from)
}

/// Relabel the Q-expression as an S-expression and evaluate it in the calling frame
fn builtin_eval(evaluator: &Evaluator, env: &Environment, args: Vec<Value>) -> Value {
    match single_qexpr("eval", args) {
        Ok(cells) => evaluator.eval(env, Value::SExpr(cells)),
        Err(e) => e.into(),
    }
}

fn builtin_join(_: &Evaluator, _: &Environment, args: Vec<Value>) -> Value {
    if args.is_empty() {
        return LispError::argument_count("join", 0, 1).into();
    }

    let mut joined = Vec::new();
    for (index, arg) in args.into_iter().enumerate() {
        match into_qexpr_cells("join", index, arg) {
            Ok(cells) => joined.extend(cells),
            Err(e) => return e.into(),
        }
    }
    Value::QExpr(joined)
}

fn builtin_cons(_: &Evaluator, _: &Environment, args: Vec<Value>) -> Value {
    if let Err(e) = check_count("cons", &args, 2) {
        return e.into();
    }

    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(first), Some(list)) => match into_qexpr_cells("cons", 1, list) {
            Ok(mut cells) => {
                cells.insert(0, first);
                Value::QExpr(cells)
            }
            Err(e) => e.into(),
        },
        _ => LispError::argument_count("cons", 0, 2).into(),
    }
}

//
// Definitions
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Local,
}

/// Shared body of `def` and `=`: a Q-expression of symbols followed by one value each
fn bind_symbols(
    evaluator: &Evaluator,
    env: &Environment,
    name: &str,
    scope: Scope,
    args: Vec<Value>,
) -> Result<Value, LispError> {
    let mut args = args.into_iter();
    let Some(first) = args.next() else {
        return Err(LispError::argument_count(name, 0, 1));
    };

    let cells = into_qexpr_cells(name, 0, first)?;
    let symbols = symbol_names(cells, |other| {
        LispError::new(
            ErrorKind::ArgumentType,
            format!(
                "Function '{name}' cannot define non-symbol. Got {}, Expected Symbol.",
                other.type_name()
            ),
        )
    })?;

    let values: Vec<Value> = args.collect();
    if symbols.len() != values.len() {
        return Err(LispError::new(
            ErrorKind::ArgumentCount,
            format!(
                "Function '{name}' passed incorrect number of values to symbols. Got {}, Expected {}.",
                values.len(),
                symbols.len()
            ),
        ));
    }

    for (symbol, value) in symbols.iter().zip(values) {
        match scope {
            Scope::Global => evaluator.define(symbol, value),
            Scope::Local => env.put(symbol, value),
        }
    }
    Ok(Value::sexpr())
}

fn builtin_def(evaluator: &Evaluator, env: &Environment, args: Vec<Value>) -> Value {
    bind_symbols(evaluator, env, "def", Scope::Global, args).unwrap_or_else(Value::from)
}

fn builtin_put(evaluator: &Evaluator, env: &Environment, args: Vec<Value>) -> Value {
    bind_symbols(evaluator, env, "=", Scope::Local, args).unwrap_or_else(Value::from)
}

fn make_closure(env: &Environment, args: Vec<Value>) -> Result<Value, LispError> {
    check_count("\\", &args, 2)?;
    let mut args = args.into_iter();
    let (Some(formals), Some(body)) = (args.next(), args.next()) else {
        return Err(LispError::argument_count("\\", 0, 2));
    };

    let formals = into_qexpr_cells("\\", 0, formals)?;
    let body = into_qexpr_cells("\\", 1, body)?;
    let formals = symbol_names(formals, |other| {
        LispError::new(
            ErrorKind::ArgumentType,
            format!(
                "Cannot define non-symbol. Got {}, Expected Symbol.",
                other.type_name()
            ),
        )
    })?;
    validate_formals(&formals)?;

    Ok(Closure {
        formals,
        body,
        env: Environment::child(env),
    }
    .into())
}

fn builtin_lambda(_: &Evaluator, env: &Environment, args: Vec<Value>) -> Value {
    make_closure(env, args).unwrap_or_else(Value::from)
}

/// Global registry of all built-in operations
static BUILTIN_OPS: &[Builtin] = &[
    // Arithmetic operations
    builtin("+", builtin_add),
    builtin("-", builtin_sub),
    builtin("*", builtin_mul),
    builtin("/", builtin_div),
    builtin("%", builtin_rem),
    builtin("pow", builtin_pow),
    builtin("min", builtin_min),
    builtin("max", builtin_max),
    builtin("add", builtin_add_named),
    builtin("sub", builtin_sub_named),
    builtin("mul", builtin_mul_named),
    builtin("div", builtin_div_named),
    // List operations
    builtin("list", builtin_list),
    builtin("head", builtin_head),
    builtin("tail", builtin_tail),
    builtin("eval", builtin_eval),
    builtin("join", builtin_join),
    builtin("init", builtin_init),
    builtin("cons", builtin_cons),
    // Definitions
    builtin("def", builtin_def),
    builtin("=", builtin_put),
    builtin("\\", builtin_lambda),
];

const fn builtin(name: &'static str, func: BuiltinFn) -> Builtin {
    Builtin { name, func }
}

/// Lazy static map from name to registry entry (use find_builtin)
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static Builtin>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.name, op)).collect());

/// All builtin operations, in registration order
pub fn builtin_ops() -> &'static [Builtin] {
    BUILTIN_OPS
}

/// Find a builtin operation by the symbol it is bound to
pub fn find_builtin(name: &str) -> Option<&'static Builtin> {
    BUILTIN_INDEX.get(name).copied()
}
