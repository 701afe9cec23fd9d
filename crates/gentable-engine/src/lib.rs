//! Sandboxed formula language for generated tables.
//!
//! Formulas are parsed into an [`Expr`] tree and evaluated against a
//! [`Scope`]. The language covers arithmetic, comparisons, boolean logic,
//! conditionals (`c ? a : b` and `a if c else b`), indexing, list literals
//! and the allow-listed functions in [`builtins`]. Arithmetic broadcasts
//! over arrays, which is what vectorized table evaluation builds on.

pub mod builtins;
pub mod cache;
mod engine;
pub mod error;
pub mod expr;
pub mod scope;
pub mod value;

pub use builtins::{Arity, BUILTINS, Builtin, Functions};
pub use cache::ExprCache;
pub use engine::{Engine, is_valid_name};
pub use error::{EvalError, FormulaError, ParseError};
pub use expr::{Expr, normalize, parse};
pub use scope::{Bind, EmptyScope, Layered, Scope};
pub use value::Value;
