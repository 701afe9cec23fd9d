//! Error types for gentable core.

use gentable_engine::{EvalError, ParseError};
use thiserror::Error;

/// Errors raised while building a table or producing its rows.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("syntax error in column '{column}' ({expr}): {source}")]
    Syntax {
        column: String,
        expr: String,
        #[source]
        source: ParseError,
    },

    #[error("error evaluating column '{column}' ({expr}) at row {row}: {source}")]
    Eval {
        column: String,
        expr: String,
        row: usize,
        #[source]
        source: EvalError,
    },

    #[error("error evaluating table condition ({expr}) at row {row}: {source}")]
    StopCondition {
        expr: String,
        row: usize,
        #[source]
        source: EvalError,
    },

    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("column '{0}' is already defined")]
    DuplicateColumn(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("invalid name '{0}': names must match [A-Za-z_][A-Za-z0-9_]* and not be a keyword")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid table definition: {0}")]
    Definition(#[from] toml::de::Error),

    #[error("CSV parse error at line {line}: {message}")]
    Csv { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, TableError>;
