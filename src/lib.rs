//! Lispy - a small Lisp interpreter core
//!
//! This crate evaluates symbolic expressions written in a minimal Lisp notation against
//! a mutable, lexically scoped environment. Every evaluation produces a [`value::Value`];
//! failures are ordinary values too, so a malformed expression never aborts the host.
//!
//! ## Notation
//!
//! ```text
//! (+ 1 2 3)                      ; arithmetic, folds left to right
//! (/ 10 4.0)                     ; a float operand promotes the fold
//! {1 2 3}                        ; Q-expression: quoted data, never evaluated
//! (head {1 2 3})                 ; list operations work on Q-expressions
//! (def {add2} (\ {a b} {+ a b})) ; global definition of a closure
//! (def {inc} (add2 1))           ; partial application returns a new closure
//! (\ {x & rest} {rest})          ; variadic formals
//! ```
//!
//! ## Errors as values
//!
//! Any operation that cannot proceed returns `Value::Error`. Evaluation of an
//! S-expression stops at the first failing child, left to right, and hands that
//! error upward unchanged.
//!
//! ## Modules
//!
//! - `value`: the runtime datum and its printer
//! - `environment`: symbol frames with parent chaining
//! - `reader`: generic syntax tree to values
//! - `evaluator`: reduction of S-expressions and function application
//! - `builtinops`: the primitive operations registered into the global frame
//! - `grammar`: text to syntax tree (behind the `grammar` feature)

use std::fmt;

/// Maximum nesting depth accepted by the grammar.
/// Evaluation itself has no depth limit; deep recursion in user code is not guarded.
pub const MAX_PARSE_DEPTH: usize = 64;

/// Categorizes the different kinds of evaluation failures carried by error values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A symbol had no binding in any frame of the chain
    UnboundSymbol,
    /// Integer or float division (or modulo) by zero
    DivisionByZero,
    /// `%` applied to a float operand
    NonIntegerModulo,
    /// A numeric literal could not be represented
    InvalidNumber,
    /// Checked integer arithmetic overflowed
    IntegerOverflow,
    /// A builtin received the wrong number of arguments
    ArgumentCount,
    /// A builtin received an argument of the wrong type
    ArgumentType,
    /// A list operation received an empty Q-expression
    EmptyList,
    /// An S-expression whose head is not a function
    NotAFunction,
    /// A closure was applied to more arguments than it has formals
    TooManyArguments,
    /// A formals list with a misplaced `&` marker
    InvalidFormals,
}

/// A structured evaluation error: a kind plus a message formatted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LispError {
    pub kind: ErrorKind,
    pub message: String,
}

impl LispError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        LispError {
            kind,
            message: message.into(),
        }
    }

    pub fn unbound_symbol(name: &str) -> Self {
        Self::new(ErrorKind::UnboundSymbol, format!("Unbound Symbol '{name}'"))
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "Division by zero")
    }

    pub fn non_integer_modulo() -> Self {
        Self::new(ErrorKind::NonIntegerModulo, "Non-integer modulo")
    }

    pub fn invalid_number() -> Self {
        Self::new(ErrorKind::InvalidNumber, "invalid number")
    }

    pub fn integer_overflow(op: &str) -> Self {
        Self::new(
            ErrorKind::IntegerOverflow,
            format!("Integer overflow in '{op}'"),
        )
    }

    /// Create an argument-count error for the builtin `func`
    pub fn argument_count(func: &str, got: usize, expected: usize) -> Self {
        let qualifier = if got > expected { "too many" } else { "too few" };
        Self::new(
            ErrorKind::ArgumentCount,
            format!(
                "Function '{func}' passed {qualifier} arguments. Got {got}, Expected {expected}."
            ),
        )
    }

    /// Create an argument-type error for argument `index` of the builtin `func`
    pub fn argument_type(func: &str, index: usize, got: &str, expected: &str) -> Self {
        Self::new(
            ErrorKind::ArgumentType,
            format!(
                "Function '{func}' passed incorrect type for argument {index}. Got {got}, Expected {expected}."
            ),
        )
    }

    pub fn empty_list(func: &str) -> Self {
        Self::new(ErrorKind::EmptyList, format!("Function '{func}' passed {{}}!"))
    }

    pub fn not_a_function(got: &str) -> Self {
        Self::new(
            ErrorKind::NotAFunction,
            format!("S-Expression starts with incorrect type. Got {got}, expected Function."),
        )
    }

    pub fn too_many_arguments(given: usize, total: usize) -> Self {
        Self::new(
            ErrorKind::TooManyArguments,
            format!("Function passed too many arguments. Got {given}, expected {total}"),
        )
    }

    pub fn invalid_formals() -> Self {
        Self::new(
            ErrorKind::InvalidFormals,
            "Function format invalid. Symbol '&' not followed by single symbol.",
        )
    }
}

impl fmt::Display for LispError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LispError {}

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (stray closers, characters outside the alphabet)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed parentheses or braces)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given byte offset,
    /// recording the character found there
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let found = input
            .get(error_offset..)
            .and_then(|rest| rest.chars().next())
            .map(String::from);

        // The window is measured in characters; the offset is in bytes
        let error_char = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count();

        // Show some input before the error position
        let context_start = error_char.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();
        let context_end = context_start + context_str.chars().count();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_end < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ParseError: {}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod reader;
pub mod value;

#[cfg(feature = "grammar")]
pub mod grammar;

pub use environment::Environment;
pub use evaluator::{EvalConfig, Evaluator, Scoping};
pub use reader::{SyntaxNode, read};
pub use value::{Builtin, BuiltinFn, Closure, Function, Value};

#[cfg(feature = "grammar")]
pub use grammar::{ParseConfig, parse, parse_syntax};
