//! This module defines the runtime value type of the interpreter. The main enum, [`Value`],
//! covers numbers, first-class errors, symbols, functions and the two list forms:
//! S-expressions, which reduce when evaluated, and Q-expressions, which are inert data.
//! Ergonomic helper functions such as [`int`], [`sym`] and [`qexpr`] are provided for
//! building values in code and tests, along with conversion traits for common Rust types.
//!
//! `Clone` is the deep copy of a value. Composite children are copied recursively; a
//! closure's environment is a shared handle, so a copied closure and its original see
//! the same captured frame.
//!
//! The [`fmt::Display`] implementation is the printer handed every evaluation result.

use crate::environment::Environment;
use crate::evaluator::Evaluator;
use crate::{ErrorKind, LispError};
use std::fmt;

/// Formal parameter marking a variadic tail: `{x & rest}`
pub(crate) const VARIADIC_MARKER: &str = "&";

/// Canonical signature of a native operation.
///
/// Builtins receive the evaluator (for `eval` and global definitions), the calling
/// environment and ownership of their already-evaluated arguments.
pub type BuiltinFn = fn(&Evaluator, &Environment, Vec<Value>) -> Value;

/// A named native operation
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl Builtin {
    pub fn call(&self, evaluator: &Evaluator, env: &Environment, args: Vec<Value>) -> Value {
        (self.func)(evaluator, env, args)
    }
}

// Builtins compare by name, not by function pointer
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// A user-defined function: the formals still awaiting arguments, the body
/// expressions and the captured environment.
#[derive(Clone, PartialEq)]
pub struct Closure {
    pub formals: Vec<String>,
    pub body: Vec<Value>,
    pub env: Environment,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure(formals={:?}, body=[", self.formals)?;
        for (i, v) in self.body.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:?}")?;
        }
        write!(f, "])")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Function {
    Builtin(Builtin),
    Closure(Closure),
}

/// Core runtime datum
///
/// To build values, use the helper functions:
/// - `int(42)`, `float(2.5)`, `sym("name")` for atoms
/// - `qexpr(vec![int(1), sym("x")])` and `sexpr(..)` for lists
/// - `val([1, 2, 3])` for homogeneous Q-expressions
#[derive(Clone, PartialEq)]
pub enum Value {
    /// Integer numbers
    Int(i64),
    /// Floating point numbers
    Float(f64),
    /// First-class errors
    Error(LispError),
    /// Identifiers awaiting environment lookup
    Symbol(String),
    /// Builtins and closures
    Function(Function),
    /// Expressions awaiting evaluation
    SExpr(Vec<Value>),
    /// Quoted lists, never evaluated automatically
    QExpr(Vec<Value>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, cells: &[Value]) -> fmt::Result {
            write!(f, "{name}(")?;
            for (i, v) in cells.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v:?}")?;
            }
            write!(f, ")")
        }

        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::Error(e) => write!(f, "Error({:?}, \"{}\")", e.kind, e.message),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Function(Function::Builtin(b)) => write!(f, "{b:?}"),
            Value::Function(Function::Closure(c)) => write!(f, "{c:?}"),
            Value::SExpr(cells) => list(f, "SExpr", cells),
            Value::QExpr(cells) => list(f, "QExpr", cells),
        }
    }
}

impl Value {
    /// An empty S-expression, also the unit result of definitions
    pub fn sexpr() -> Self {
        Value::SExpr(Vec::new())
    }

    /// An empty Q-expression
    pub fn qexpr() -> Self {
        Value::QExpr(Vec::new())
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Value::Error(LispError::new(kind, message))
    }

    /// Human readable name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Error(_) => "Error",
            Value::Symbol(_) => "Symbol",
            Value::Function(_) => "Function",
            Value::SExpr(_) => "S-Expression",
            Value::QExpr(_) => "Q-Expression",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Children of an S- or Q-expression
    pub fn cells(&self) -> Option<&[Value]> {
        match self {
            Value::SExpr(cells) | Value::QExpr(cells) => Some(cells),
            _ => None,
        }
    }

    fn cells_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::SExpr(cells) | Value::QExpr(cells) => Some(cells),
            _ => None,
        }
    }

    /// Number of children; atoms have none
    pub fn count(&self) -> usize {
        self.cells().map_or(0, <[Value]>::len)
    }

    /// Append a child to an S- or Q-expression. Atoms are left untouched.
    pub fn add(&mut self, child: Value) {
        if let Some(cells) = self.cells_mut() {
            cells.push(child);
        }
    }

    /// Builder form of [`Value::add`]
    pub fn with(mut self, child: Value) -> Self {
        self.add(child);
        self
    }

    /// Remove and return the child at `index`, shifting the rest down
    pub fn pop(&mut self, index: usize) -> Option<Value> {
        let cells = self.cells_mut()?;
        (index < cells.len()).then(|| cells.remove(index))
    }

    /// Consume the list and keep only the child at `index`
    pub fn take(self, index: usize) -> Option<Value> {
        match self {
            Value::SExpr(mut cells) | Value::QExpr(mut cells) if index < cells.len() => {
                Some(cells.swap_remove(index))
            }
            _ => None,
        }
    }

    /// Move every child of `other` onto the end of this list
    pub fn join(mut self, other: Value) -> Self {
        if let (Some(cells), Value::SExpr(more) | Value::QExpr(more)) = (self.cells_mut(), other)
        {
            cells.extend(more);
        }
        self
    }
}

impl From<LispError> for Value {
    fn from(e: LispError) -> Self {
        Value::Error(e)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Closure> for Value {
    fn from(c: Closure) -> Self {
        Value::Function(Function::Closure(c))
    }
}

impl From<Builtin> for Value {
    fn from(b: Builtin) -> Self {
        Value::Function(Function::Builtin(b))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Int(i64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::QExpr(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::QExpr(arr.into_iter().map(Into::into).collect())
    }
}

/// Symbol helper, accepts both &str and String
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

pub fn int(n: i64) -> Value {
    Value::Int(n)
}

pub fn float(x: f64) -> Value {
    Value::Float(x)
}

/// Generic helper for anything convertible into a value; sequences become Q-expressions
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

pub fn qexpr(cells: Vec<Value>) -> Value {
    Value::QExpr(cells)
}

pub fn sexpr(cells: Vec<Value>) -> Value {
    Value::SExpr(cells)
}

fn write_cells(f: &mut fmt::Formatter<'_>, open: char, cells: &[Value], close: char) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{cell}")?;
    }
    write!(f, "{close}")
}

/// Positional notation for moderate magnitudes, shortest exponent form otherwise
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        write!(f, "{x:e}")
    } else {
        write!(f, "{x}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write_float(f, *x),
            Value::Error(e) => write!(f, "Error: {e}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Function(Function::Builtin(_)) => write!(f, "<builtin>"),
            Value::Function(Function::Closure(closure)) => {
                write!(f, "(\\ {{{}}} ", closure.formals.join(" "))?;
                write_cells(f, '{', &closure.body, '}')?;
                write!(f, ")")
            }
            Value::SExpr(cells) => write_cells(f, '(', cells, ')'),
            Value::QExpr(cells) => write_cells(f, '{', cells, '}'),
        }
    }
}
