//! Text to syntax tree, built on `nom`.
//!
//! The tree mirrors what an mpc-style grammar would produce for
//!
//! ```text
//! number : /-?[0-9]+/ ;
//! symbol : /[a-zA-Z0-9_+\-*\/\\=<>!&%^.]+/ ;
//! sexpr  : '(' <expr>* ')' ;
//! qexpr  : '{' <expr>* '}' ;
//! expr   : <number> | <symbol> | <sexpr> | <qexpr> ;
//! lispy  : /^/ <expr>* /$/ ;
//! ```
//!
//! so that [`crate::reader::read`] can consume it. Atoms are scanned as one token over
//! the symbol alphabet and classified afterwards: a token that starts with a digit, or
//! with `-` followed by a digit, is a number. Malformed numbers such as `1x` are left
//! for the reader to turn into error values.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{cut, recognize, value},
    error::ErrorKind,
    multi::many0_count,
    sequence::pair,
};

use crate::reader::{ROOT_TAG, SyntaxNode, read};
use crate::value::Value;
use crate::{MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters allowed in a symbol besides ASCII alphanumerics
const SYMBOL_SPECIAL_CHARS: &str = "_+-*/\\=<>!&%^.";

/// Grammar options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Skip `;` line comments as whitespace
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ListForm {
    tag: &'static str,
    open: char,
    close: char,
}

const SEXPR: ListForm = ListForm {
    tag: "expr|sexpr|>",
    open: '(',
    close: ')',
};

const QEXPR: ListForm = ListForm {
    tag: "expr|qexpr|>",
    open: '{',
    close: '}',
};

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn is_number_token(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

/// Convert nom parsing errors to structured parse errors
fn parse_error_from_nom(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::TooLarge => ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    position,
                ),
                ErrorKind::Eof => ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input, expected closing delimiter",
                    input,
                    position,
                ),
                _ => match e.input.chars().next() {
                    Some(c @ (')' | '}')) => ParseError::with_context(
                        ParseErrorKind::InvalidSyntax,
                        format!("Unexpected '{c}' at position {position}"),
                        input,
                        position,
                    ),
                    Some(c) => ParseError::with_context(
                        ParseErrorKind::InvalidSyntax,
                        format!("Unexpected character '{c}' at position {position}"),
                        input,
                        position,
                    ),
                    None => ParseError::from_message(
                        ParseErrorKind::Incomplete,
                        "Unexpected end of input",
                    ),
                },
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_till(|c: char| c == '\n'))).parse(input)
}

/// Skip whitespace, and line comments when enabled
fn skip_space(input: &str, config: ParseConfig) -> IResult<&str, ()> {
    if config.handle_comments {
        value((), many0_count(alt((multispace1, comment)))).parse(input)
    } else {
        value((), multispace0).parse(input)
    }
}

fn parse_atom(input: &str) -> IResult<&str, SyntaxNode> {
    take_while1(is_symbol_char)
        .map(|token: &str| {
            let tag = if is_number_token(token) {
                "expr|number|regex"
            } else {
                "expr|symbol|regex"
            };
            SyntaxNode::leaf(tag, token)
        })
        .parse(input)
}

/// Parse a delimited list; delimiters are kept as `char` leaves
fn parse_list(
    input: &str,
    form: ListForm,
    config: ParseConfig,
    depth: usize,
) -> IResult<&str, SyntaxNode> {
    let (mut input, _) = char(form.open).parse(input)?;
    let mut children = vec![SyntaxNode::leaf("char", form.open)];

    loop {
        let (rest, ()) = skip_space(input, config)?;

        if rest.is_empty() {
            // Unclosed list: do not let callers backtrack past this point
            return Err(nom::Err::Failure(nom::error::Error::new(
                rest,
                ErrorKind::Eof,
            )));
        }

        if let Some(rest) = rest.strip_prefix(form.close) {
            children.push(SyntaxNode::leaf("char", form.close));
            return Ok((rest, SyntaxNode::branch(form.tag, children)));
        }

        // Past the opening delimiter a bad element is final
        let (rest, child) = cut(|input| parse_expr(input, config, depth + 1)).parse(rest)?;
        children.push(child);
        input = rest;
    }
}

fn parse_expr(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, SyntaxNode> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    alt((
        |input| parse_list(input, SEXPR, config, depth),
        |input| parse_list(input, QEXPR, config, depth),
        parse_atom,
    ))
    .parse(input)
}

/// Parse source text into a syntax tree using the default configuration.
pub fn parse_syntax(input: &str) -> Result<SyntaxNode, ParseError> {
    parse_syntax_with_config(input, ParseConfig::default())
}

/// Parse source text into a syntax tree rooted at a `>` node.
pub fn parse_syntax_with_config(
    input: &str,
    config: ParseConfig,
) -> Result<SyntaxNode, ParseError> {
    let mut children = vec![SyntaxNode::leaf("regex", "")];
    let mut rest = input;

    loop {
        let (after_space, ()) =
            skip_space(rest, config).map_err(|e| parse_error_from_nom(input, e))?;
        if after_space.is_empty() {
            break;
        }
        let (after_expr, expr) =
            parse_expr(after_space, config, 0).map_err(|e| parse_error_from_nom(input, e))?;
        children.push(expr);
        rest = after_expr;
    }

    children.push(SyntaxNode::leaf("regex", ""));
    Ok(SyntaxNode::branch(ROOT_TAG, children))
}

/// Parse source text straight into a value: the whole input as one S-expression.
pub fn parse(input: &str) -> Result<Value, ParseError> {
    parse_syntax(input).map(|tree| read(&tree))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::LispError;
    use crate::value::{float, int, qexpr, sexpr, sym};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),
        Failure(ParseErrorKind),
    }
    use ParseTestResult::*;

    fn success(value: Value) -> ParseTestResult {
        Success(value)
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let case = format!("Test case #{} ({input:?})", i + 1);
            match (parse(input), expected) {
                (Ok(actual), Success(expected)) => assert_eq!(actual, expected, "{case}"),
                (Err(e), Failure(kind)) => assert_eq!(e.kind, kind, "{case}: {e}"),
                (actual, expected) => panic!("{case}: expected {expected:?}, got {actual:?}"),
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // === ATOMS ===
            ("42", success(sexpr(vec![int(42)]))),
            ("-7", success(sexpr(vec![int(-7)]))),
            ("3.25", success(sexpr(vec![float(3.25)]))),
            ("-0.5", success(sexpr(vec![float(-0.5)]))),
            ("-", success(sexpr(vec![sym("-")]))),
            ("-x", success(sexpr(vec![sym("-x")]))),
            ("x-1", success(sexpr(vec![sym("x-1")]))),
            ("add2to5", success(sexpr(vec![sym("add2to5")]))),
            ("\\", success(sexpr(vec![sym("\\")]))),
            ("&", success(sexpr(vec![sym("&")]))),
            ("<=", success(sexpr(vec![sym("<=")]))),
            // Number tokens that do not fit become error values in place
            ("1x", success(sexpr(vec![LispError::invalid_number().into()]))),
            (
                "99999999999999999999",
                success(sexpr(vec![LispError::invalid_number().into()])),
            ),
            // === WHITESPACE AND EMPTY INPUT ===
            ("", success(sexpr(vec![]))),
            ("   \n\t ", success(sexpr(vec![]))),
            ("  + 1   2 ", success(sexpr(vec![sym("+"), int(1), int(2)]))),
            // === LISTS ===
            ("()", success(sexpr(vec![sexpr(vec![])]))),
            ("{}", success(sexpr(vec![qexpr(vec![])]))),
            (
                "+ 1 (* 2 3)",
                success(sexpr(vec![
                    sym("+"),
                    int(1),
                    sexpr(vec![sym("*"), int(2), int(3)]),
                ])),
            ),
            (
                "(head {1 2 3})",
                success(sexpr(vec![sexpr(vec![
                    sym("head"),
                    qexpr(vec![int(1), int(2), int(3)]),
                ])])),
            ),
            (
                "{{1}(2)}",
                success(sexpr(vec![qexpr(vec![
                    qexpr(vec![int(1)]),
                    sexpr(vec![int(2)]),
                ])])),
            ),
            (
                "def {x y} 1 2",
                success(sexpr(vec![
                    sym("def"),
                    qexpr(vec![sym("x"), sym("y")]),
                    int(1),
                    int(2),
                ])),
            ),
            // === COMMENTS ===
            ("; nothing here", success(sexpr(vec![]))),
            (
                "+ 1 ; one\n 2 ; two",
                success(sexpr(vec![sym("+"), int(1), int(2)])),
            ),
            ("(1 ; inside\n)", success(sexpr(vec![sexpr(vec![int(1)])]))),
            // === ERRORS ===
            ("(+ 1 2", Failure(ParseErrorKind::Incomplete)),
            ("{1 {2}", Failure(ParseErrorKind::Incomplete)),
            ("(", Failure(ParseErrorKind::Incomplete)),
            ("(+ 1 2))", Failure(ParseErrorKind::InvalidSyntax)),
            ("}", Failure(ParseErrorKind::InvalidSyntax)),
            ("(1 }", Failure(ParseErrorKind::InvalidSyntax)),
            ("+ 1 #", Failure(ParseErrorKind::InvalidSyntax)),
            ("\"str\"", Failure(ParseErrorKind::InvalidSyntax)),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_syntax_tree_shape() {
        let tree = parse_syntax("+ 1 (x)").unwrap();
        let expected = SyntaxNode::branch(
            ROOT_TAG,
            vec![
                SyntaxNode::leaf("regex", ""),
                SyntaxNode::leaf("expr|symbol|regex", "+"),
                SyntaxNode::leaf("expr|number|regex", "1"),
                SyntaxNode::branch(
                    "expr|sexpr|>",
                    vec![
                        SyntaxNode::leaf("char", "("),
                        SyntaxNode::leaf("expr|symbol|regex", "x"),
                        SyntaxNode::leaf("char", ")"),
                    ],
                ),
                SyntaxNode::leaf("regex", ""),
            ],
        );
        assert_eq!(tree, expected);
        assert_eq!(tree.leaf_count(), 7);
        assert_eq!(tree.branch_count(), 2);
    }

    #[test]
    fn test_comment_handling_config() {
        let no_comments = ParseConfig {
            handle_comments: false,
        };
        assert!(parse_syntax_with_config("1 ; two", ParseConfig::default()).is_ok());

        let err = parse_syntax_with_config("1 ; two", no_comments).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.found.as_deref(), Some(";"));
    }

    #[test]
    fn test_error_details() {
        let err = parse_syntax("(+ 1 2))").unwrap_err();
        assert_eq!(err.message, "Unexpected ')' at position 7");
        assert_eq!(err.found.as_deref(), Some(")"));

        let err = parse_syntax("(+ 1 2").unwrap_err();
        assert_eq!(err.found, None);
        assert!(err.to_string().starts_with("ParseError: Unexpected end of input"));

        let err = parse_syntax("(1 }").unwrap_err();
        assert_eq!(err.message, "Unexpected '}' at position 3");
        assert!(err.to_string().starts_with("ParseError: Unexpected '}'"));
    }

    #[test]
    fn test_parser_depth_limits() {
        let under_limit = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH - 1),
            ")".repeat(MAX_PARSE_DEPTH - 1)
        );
        let at_limit = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );
        let braces_at_limit = format!("{}{}", "{".repeat(MAX_PARSE_DEPTH + 1), "}".repeat(MAX_PARSE_DEPTH + 1));

        assert!(
            parse_syntax(&under_limit).is_ok(),
            "Parens just under depth limit should parse successfully"
        );
        for input in [at_limit.as_str(), braces_at_limit.as_str()] {
            let err = parse_syntax(input).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);
            assert!(err.message.contains(&MAX_PARSE_DEPTH.to_string()));
        }
    }

    #[test]
    fn test_number_token_classification() {
        for (token, is_number) in [
            ("0", true),
            ("12", true),
            ("-3", true),
            ("1.5", true),
            ("1x", true),
            ("-", false),
            ("-a", false),
            ("a1", false),
            (".5", false),
        ] {
            assert_eq!(is_number_token(token), is_number, "{token}");
        }
    }
}
