//! # bucketdb filter
//!
//! A small jq-flavoured expression language for selecting documents.
//!
//! ```text
//! .key >= 98
//! .user.name == "alice" && $len(.tags) > 0
//! $contains($lower(.title), "rust") || .["odd key"][0] != null
//! ```
//!
//! - Paths: `.` is the whole document, `.a.b` walks objects, `[n]` indexes
//!   arrays and `.["key"]` reaches keys that are not identifiers. A path
//!   that does not exist evaluates to `null`.
//! - Literals: numbers, `"strings"` or `'strings'`, `true`, `false`, `null`.
//! - Operators, loosest first: `||`, `&&`, `== !=`, `< <= > >=`, `+ -`,
//!   `* / %`, then unary `!` and `-`.
//! - Functions: `$len`, `$has`, `$contains`, `$lower`, `$upper`.
//!
//! Parsing happens once; a parsed [`Filter`] can be evaluated against any
//! number of documents from any number of threads.
//!
//! ```
//! use bucketdb_filter::Filter;
//! use serde_json::json;
//!
//! let filter = Filter::parse(".key >= 98").unwrap();
//! assert!(filter.matches_value(&json!({"key": 99})).unwrap());
//! assert!(!filter.matches_value(&json!({"key": 3})).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, Function, Segment, UnaryOp};
pub use error::{EvalError, EvalResult, ParseError};

use eval::Root;

/// Deepest nesting a filter expression may have. Parentheses, unary
/// operators, function calls and each operator in a chain all count.
pub const MAX_DEPTH: usize = 128;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    source: String,
    expr: Expr,
}

impl Filter {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] with the byte offset of the first problem.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    /// The expression text this filter was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed expression tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates the expression with `.` bound to `value`.
    ///
    /// # Errors
    ///
    /// Fails when an operator or function meets operands it cannot handle.
    pub fn evaluate(&self, value: &Value) -> EvalResult<Value> {
        eval::eval(&self.expr, Root::Value(value))
    }

    /// Evaluates the expression with `.` bound to a document and requires a boolean.
    ///
    /// # Errors
    ///
    /// Fails like [`evaluate`](Self::evaluate), or with
    /// [`EvalError::NotBoolean`] when the result is not `true` or `false`.
    pub fn matches(&self, doc: &Map<String, Value>) -> EvalResult<bool> {
        as_bool(eval::eval(&self.expr, Root::Object(doc))?)
    }

    /// Like [`matches`](Self::matches) for any JSON value.
    ///
    /// # Errors
    ///
    /// See [`matches`](Self::matches).
    pub fn matches_value(&self, value: &Value) -> EvalResult<bool> {
        as_bool(self.evaluate(value)?)
    }
}

fn as_bool(value: Value) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::NotBoolean {
            found: eval::kind(&other),
        }),
    }
}

impl FromStr for Filter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
