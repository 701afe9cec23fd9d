//! Error types for the gentable command line

use thiserror::Error;

/// Errors in how the command line was used
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("Invalid parameter '{0}': expected name=expr")]
    InvalidParam(String),

    #[error("Unknown format '{0}': expected markdown or csv")]
    UnknownFormat(String),

    #[error("Invalid number for {option}: {value}")]
    InvalidNumber { option: String, value: String },

    #[error("No table definition file given")]
    NoInput,
}
