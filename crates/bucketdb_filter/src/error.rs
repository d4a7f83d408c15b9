//! Error types for parsing and evaluating filters.

use thiserror::Error;

/// A filter expression could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    /// Byte offset into the expression where the problem was found.
    pub position: usize,
    /// Description of the problem.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Evaluating a filter against one document failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// An operator or function got operands of the wrong kind.
    #[error("type mismatch: {op} cannot apply to {left} and {right}")]
    TypeMismatch {
        /// The operator or function.
        op: &'static str,
        /// Kind of the left (or only) operand.
        left: &'static str,
        /// Kind of the right operand, or "-" for unary operations.
        right: &'static str,
    },

    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Arithmetic produced a number JSON cannot hold.
    #[error("arithmetic produced a non-finite number")]
    NonFinite,

    /// The filter's result was not a boolean.
    #[error("filter result is {found}, not a boolean")]
    NotBoolean {
        /// Kind of the value produced.
        found: &'static str,
    },
}

/// Result type for filter evaluation.
pub type EvalResult<T> = Result<T, EvalError>;
