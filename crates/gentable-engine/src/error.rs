//! Error types for parsing and evaluating formulas.

use thiserror::Error;

/// A formula could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at offset {position}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the source text.
    pub position: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

/// A parsed formula failed while being evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    Name(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    ZeroDivision,

    #[error("index {index} out of range for length {len}")]
    Index { index: i64, len: usize },

    #[error("key '{0}' not found")]
    Key(String),

    #[error("{name}() takes {expected} argument(s) but {got} were given")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("math domain error in {0}()")]
    Domain(&'static str),
}

impl EvalError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }
}

/// Either half of compiling and running a formula in one step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
