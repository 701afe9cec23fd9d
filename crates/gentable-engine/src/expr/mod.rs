//! Formula language.
//!
//! - [`parse`] - Turn surface or canonical formula text into an [`Expr`]
//! - [`normalize`] - Rewrite surface text into the canonical grammar
//! - [`eval`] - Evaluate an [`Expr`] against a [`Scope`](crate::Scope)
//!
//! Nothing outside this tree is reachable from a formula: there is no
//! attribute access, no assignment, and calls resolve only against the
//! [`Functions`](crate::Functions) registry the caller passes in.

mod ast;
mod eval;
mod lexer;
mod normalize;
mod parser;

pub use ast::{BinaryOp, CompareOp, Expr, LogicalOp, UnaryOp};
pub use eval::eval;
pub use lexer::KEYWORDS;
pub use normalize::normalize;
pub use parser::parse;
