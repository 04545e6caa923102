//! Recursive reduction of S-expressions and function application.
//!
//! The [`Evaluator`] owns the global frame, populated with every builtin from the
//! registry, and the evaluation configuration. Evaluation never fails at the host
//! level: every problem is reported as a [`Value::Error`], and the first error met
//! while reducing an S-expression, left to right, is returned unchanged.

use crate::LispError;
use crate::builtinops::builtin_ops;
use crate::environment::Environment;
use crate::value::{Builtin, BuiltinFn, Closure, Function, VARIADIC_MARKER, Value};
use std::collections::VecDeque;
use tracing::{debug, trace, trace_span};

#[cfg(feature = "grammar")]
use crate::ParseError;

/// How a closure body resolves symbols its own frame does not bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scoping {
    /// The call frame is parented to the environment captured when the closure was created
    #[default]
    Lexical,
    /// The call frame copies the captured frame's bindings and is parented to the caller,
    /// so free symbols in the body resolve through the call site
    Dynamic,
}

/// Evaluation options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalConfig {
    pub scoping: Scoping,
}

/// Interpreter state: the global frame and the evaluation configuration
#[derive(Debug)]
pub struct Evaluator {
    global: Environment,
    config: EvalConfig,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Create an evaluator with every builtin bound in a fresh global frame
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        let global = Environment::new();
        for op in builtin_ops() {
            global.put(op.name, Value::from(*op));
        }
        debug!(
            count = builtin_ops().len(),
            scoping = ?config.scoping,
            "registered builtins"
        );
        Evaluator { global, config }
    }

    /// The global frame
    pub fn global(&self) -> &Environment {
        &self.global
    }

    pub fn config(&self) -> EvalConfig {
        self.config
    }

    pub fn set_scoping(&mut self, scoping: Scoping) {
        self.config.scoping = scoping;
    }

    /// Bind a host function in the global frame under `name`.
    ///
    /// # Example
    /// ```
    /// use lispy::{Evaluator, Value};
    ///
    /// let evaluator = Evaluator::new();
    /// evaluator.register_builtin("answer", |_, _, _| Value::Int(42));
    /// assert!(evaluator.global().lookup("answer").is_some());
    /// ```
    pub fn register_builtin(&self, name: &'static str, func: BuiltinFn) {
        debug!(name, "registering builtin");
        self.global.put(name, Builtin { name, func }.into());
    }

    /// Commit a binding to the global frame
    pub fn define(&self, name: &str, value: Value) {
        debug!(name, value = %value, "define");
        self.global.put(name, value);
    }

    /// Evaluate a value in the global frame
    pub fn evaluate(&self, value: Value) -> Value {
        self.eval(&self.global, value)
    }

    /// Parse source text and evaluate it in the global frame.
    /// Only grammar failures are reported through `Err`; evaluation errors are values.
    #[cfg(feature = "grammar")]
    pub fn eval_source(&self, input: &str) -> Result<Value, ParseError> {
        crate::grammar::parse(input).map(|value| self.evaluate(value))
    }

    /// Symbols are looked up, S-expressions reduced; everything else evaluates to itself
    pub fn eval(&self, env: &Environment, value: Value) -> Value {
        match value {
            Value::Symbol(name) => env.get(&name),
            Value::SExpr(cells) => self.eval_sexpr(env, cells),
            other => other,
        }
    }

    pub fn eval_sexpr(&self, env: &Environment, cells: Vec<Value>) -> Value {
        let mut evaluated = Vec::with_capacity(cells.len());
        for cell in cells {
            let value = self.eval(env, cell);
            if value.is_error() {
                return value;
            }
            evaluated.push(value);
        }

        let mut cells = evaluated.into_iter();
        let Some(head) = cells.next() else {
            return Value::sexpr();
        };
        let args: Vec<Value> = cells.collect();

        match head {
            Value::Function(f) => self.call(env, f, args),
            // A lone non-function is the value of the expression
            other if args.is_empty() => other,
            other => LispError::not_a_function(other.type_name()).into(),
        }
    }

    /// Apply a function to already-evaluated arguments
    pub fn call(&self, env: &Environment, f: Function, args: Vec<Value>) -> Value {
        match f {
            Function::Builtin(builtin) => {
                trace!(name = builtin.name, argc = args.len(), "call builtin");
                builtin.call(self, env, args)
            }
            Function::Closure(closure) => self.call_closure(env, closure, args),
        }
    }

    fn call_closure(&self, env: &Environment, closure: Closure, args: Vec<Value>) -> Value {
        let given = args.len();
        let total = closure.formals.len();
        let _span = trace_span!("call_closure", given, total).entered();

        let frame = match self.config.scoping {
            Scoping::Lexical => Environment::child(&closure.env),
            Scoping::Dynamic => closure.env.rebased(env),
        };

        let mut formals: VecDeque<String> = closure.formals.into();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let Some(formal) = formals.pop_front() else {
                return LispError::too_many_arguments(given, total).into();
            };

            if formal == VARIADIC_MARKER {
                let rest_name = match variadic_name(&mut formals) {
                    Ok(name) => name,
                    Err(e) => return e.into(),
                };
                let mut rest = vec![arg];
                rest.extend(args.by_ref());
                frame.put(&rest_name, Value::QExpr(rest));
                break;
            }

            frame.put(&formal, arg);
        }

        // Variadic tail with no arguments left for it
        if formals.front().is_some_and(|f| f == VARIADIC_MARKER) {
            formals.pop_front();
            match variadic_name(&mut formals) {
                Ok(name) => frame.put(&name, Value::qexpr()),
                Err(e) => return e.into(),
            }
        }

        if formals.is_empty() {
            trace!("complete application");
            self.eval(&frame, Value::SExpr(closure.body))
        } else {
            trace!(remaining = formals.len(), "partial application");
            Closure {
                formals: formals.into(),
                body: closure.body,
                env: frame,
            }
            .into()
        }
    }
}

/// The single symbol following a `&` marker, which must be the last formal
fn variadic_name(formals: &mut VecDeque<String>) -> Result<String, LispError> {
    match (formals.pop_front(), formals.is_empty()) {
        (Some(name), true) if name != VARIADIC_MARKER => Ok(name),
        _ => Err(LispError::invalid_formals()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::value::{int, qexpr, sexpr, sym};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_evaluate_constructed_values() {
        let evaluator = Evaluator::new();
        let test_cases = vec![
            (int(5), int(5)),
            (sexpr(vec![]), sexpr(vec![])),
            (sexpr(vec![sym("+"), int(1), int(2)]), int(3)),
            (sexpr(vec![sexpr(vec![int(7)])]), int(7)),
            (
                qexpr(vec![sym("+"), sym("undefined")]),
                qexpr(vec![sym("+"), sym("undefined")]),
            ),
            (
                sexpr(vec![sym("list"), int(1), sexpr(vec![sym("*"), int(2), int(3)])]),
                qexpr(vec![int(1), int(6)]),
            ),
        ];

        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(evaluator.evaluate(input), expected, "Test case #{}", i + 1);
        }
    }

    #[test]
    fn test_global_frame_holds_every_builtin() {
        let evaluator = Evaluator::new();
        for op in builtin_ops() {
            assert_eq!(evaluator.global().get(op.name), Value::from(*op));
        }
        assert_eq!(evaluator.config(), EvalConfig::default());
        assert_eq!(evaluator.config().scoping, Scoping::Lexical);
    }

    #[test]
    fn test_register_builtin_and_define() {
        let evaluator = Evaluator::new();
        evaluator.register_builtin("count", |_, _, args| int(args.len() as i64));
        evaluator.define("x", int(10));

        let result = evaluator.evaluate(sexpr(vec![sym("count"), sym("x"), int(1), int(2)]));
        assert_eq!(result, int(3));
        assert_eq!(evaluator.evaluate(sym("x")), int(10));
    }

    #[test]
    fn test_set_scoping() {
        let mut evaluator = Evaluator::new();
        evaluator.set_scoping(Scoping::Dynamic);
        assert_eq!(evaluator.config().scoping, Scoping::Dynamic);
    }

    #[test]
    fn test_closure_binding_rules() {
        let evaluator = Evaluator::new();
        let env = evaluator.global().clone();
        let closure = |formals: &[&str], body: Vec<Value>| Closure {
            formals: formals.iter().map(|f| (*f).to_owned()).collect(),
            body,
            env: Environment::child(&env),
        };

        // Malformed formals built directly, bypassing `\` validation
        let bad = closure(&["&", "a", "b"], vec![sym("a")]);
        match evaluator.call(&env, Function::Closure(bad), vec![int(1)]) {
            Value::Error(e) => assert_eq!(e.kind, ErrorKind::InvalidFormals),
            other => panic!("expected invalid formals, got {other:?}"),
        }

        let dangling = closure(&["a", "&"], vec![sym("a")]);
        match evaluator.call(&env, Function::Closure(dangling), vec![int(1)]) {
            Value::Error(e) => assert_eq!(e.kind, ErrorKind::InvalidFormals),
            other => panic!("expected invalid formals, got {other:?}"),
        }

        // Partial application keeps the remaining formals and shares the call frame
        let pair = closure(&["a", "b"], vec![sym("list"), sym("a"), sym("b")]);
        match evaluator.call(&env, Function::Closure(pair), vec![int(1)]) {
            Value::Function(Function::Closure(partial)) => {
                assert_eq!(partial.formals, vec!["b"]);
                assert_eq!(partial.env.get("a"), int(1));
                let result = evaluator.call(&env, Function::Closure(partial), vec![int(2)]);
                assert_eq!(result, qexpr(vec![int(1), int(2)]));
            }
            other => panic!("expected partial closure, got {other:?}"),
        }
    }
}
