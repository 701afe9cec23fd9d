//! Engine creation and formula evaluation.
//!
//! An [`Engine`] bundles the function registry with a parse cache. Clones
//! share both, so a table and the caller evaluating ad-hoc formulas reuse
//! the same compiled trees.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::builtins::Functions;
use crate::cache::ExprCache;
use crate::error::{EvalError, FormulaError, ParseError};
use crate::expr::{self, Expr, KEYWORDS};
use crate::scope::Scope;
use crate::value::Value;

#[derive(Clone, Debug)]
pub struct Engine {
    functions: Arc<Functions>,
    cache: ExprCache,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    /// An engine with the standard builtins.
    pub fn new() -> Self {
        Engine::with_functions(Functions::builtin())
    }

    pub fn with_functions(functions: Functions) -> Self {
        Engine::with_functions_and_cache(functions, ExprCache::default())
    }

    /// An engine that shares an existing parse cache.
    pub fn with_functions_and_cache(functions: Functions, cache: ExprCache) -> Self {
        Engine {
            functions: Arc::new(functions),
            cache,
        }
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    pub fn cache(&self) -> &ExprCache {
        &self.cache
    }

    /// Parse `source`, reusing an earlier parse of the same text.
    pub fn compile(&self, source: &str) -> Result<Arc<Expr>, ParseError> {
        if let Some(hit) = self.cache.get(source) {
            return Ok(Arc::clone(hit.value()));
        }
        let expr = Arc::new(expr::parse(source)?);
        tracing::trace!(formula = source, canonical = %expr, "compiled formula");
        self.cache.insert(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn eval_expr(&self, expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
        expr::eval(expr, scope, &self.functions)
    }

    /// Compile and evaluate in one step.
    pub fn eval(&self, source: &str, scope: &dyn Scope) -> Result<Value, FormulaError> {
        let expr = self.compile(source)?;
        Ok(self.eval_expr(&expr, scope)?)
    }
}

fn name_regex() -> &'static Regex {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile")
    })
}

/// Whether `name` can be used for a column, parameter or reference series.
///
/// Keywords (`and`, `True`, `STOP`, ...) are rejected because formulas
/// could never refer to them.
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name) && !KEYWORDS.contains(&name)
}
