//! Conversion from a generic parsed syntax tree into values.
//!
//! The tree follows the conventions of mpc-style grammar output: every node has a tag
//! (possibly a `|`-joined chain such as `expr|number|regex`), the matched text and an
//! ordered list of children. Lists keep their delimiter tokens as `char` leaves and the
//! root carries `regex` anchor leaves; the reader skips both.

use crate::LispError;
use crate::value::Value;
use std::fmt;

/// Tag of the root node produced by the grammar
pub const ROOT_TAG: &str = ">";

/// A node of the parsed syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyntaxNode {
    pub tag: String,
    pub contents: String,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// A node without children
    pub fn leaf(tag: impl Into<String>, contents: impl Into<String>) -> Self {
        SyntaxNode {
            tag: tag.into(),
            contents: contents.into(),
            children: Vec::new(),
        }
    }

    /// A node with children and no contents of its own
    pub fn branch(tag: impl Into<String>, children: Vec<SyntaxNode>) -> Self {
        SyntaxNode {
            tag: tag.into(),
            contents: String::new(),
            children,
        }
    }

    /// Number of nodes without children in this subtree, including itself
    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(SyntaxNode::leaf_count).sum()
        }
    }

    /// Number of nodes with children in this subtree, including itself
    pub fn branch_count(&self) -> usize {
        if self.children.is_empty() {
            0
        } else {
            1 + self
                .children
                .iter()
                .map(SyntaxNode::branch_count)
                .sum::<usize>()
        }
    }

    fn is_skipped(&self) -> bool {
        matches!(self.contents.as_str(), "(" | ")" | "{" | "}")
            || self.tag == "regex"
            || (self.children.is_empty() && self.contents.trim().is_empty() && !self.is_atom())
    }

    fn is_atom(&self) -> bool {
        self.tag.contains("number") || self.tag.contains("symbol")
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        if self.children.is_empty() {
            writeln!(f, "{indent}{} '{}'", self.tag, self.contents)?;
        } else {
            writeln!(f, "{indent}{}", self.tag)?;
            for child in &self.children {
                child.write_indented(f, depth + 1)?;
            }
        }
        Ok(())
    }
}

/// Indented tree rendering, one node per line
impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Read a syntax tree into a value. Malformed number literals become error values.
pub fn read(node: &SyntaxNode) -> Value {
    if node.tag.contains("number") {
        return read_number(&node.contents);
    }
    if node.tag.contains("symbol") {
        return Value::Symbol(node.contents.clone());
    }

    let mut list = if node.tag.contains("qexpr") {
        Value::qexpr()
    } else {
        // The root, `sexpr` nodes and any other branch all read as S-expressions
        Value::sexpr()
    };

    for child in node.children.iter().filter(|child| !child.is_skipped()) {
        list.add(read(child));
    }
    list
}

/// Integers unless the literal contains a decimal point. Out-of-range literals are errors.
fn read_number(contents: &str) -> Value {
    if contents.contains('.') {
        match contents.parse::<f64>() {
            Ok(x) if x.is_finite() => Value::Float(x),
            _ => LispError::invalid_number().into(),
        }
    } else {
        contents
            .parse::<i64>()
            .map_or_else(|_| LispError::invalid_number().into(), Value::Int)
    }
}
