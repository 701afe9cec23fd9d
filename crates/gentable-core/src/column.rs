//! A single computed column.

use std::sync::Arc;

use gentable_engine::{Bind, Engine, EvalError, Expr, Scope, Value};

use crate::definition::ColumnSpec;
use crate::error::{Result, TableError};

/// Formula text together with its parsed tree.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub source: String,
    pub expr: Arc<Expr>,
}

impl Compiled {
    /// Parse `source`, attributing a syntax error to `owner`.
    pub fn new(engine: &Engine, owner: &str, source: &str) -> Result<Self> {
        let expr = engine.compile(source).map_err(|source_err| TableError::Syntax {
            column: owner.to_string(),
            expr: source.to_string(),
            source: source_err,
        })?;
        Ok(Compiled {
            source: source.to_string(),
            expr,
        })
    }
}

/// A named column: formula, declared dependencies, ordered conditions and
/// the value of its last successful computation.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    formula: Compiled,
    dependencies: Vec<String>,
    conditions: Vec<Compiled>,
    cached_value: Option<Value>,
}

impl Column {
    /// Parse every expression of `spec` up front so a bad formula fails
    /// here rather than while rows are produced.
    pub fn compile(spec: &ColumnSpec, engine: &Engine) -> Result<Self> {
        let formula = Compiled::new(engine, &spec.name, &spec.formula)?;
        let conditions = spec
            .conditions
            .iter()
            .map(|cond| Compiled::new(engine, &spec.name, cond))
            .collect::<Result<Vec<_>>>()?;
        let mut dependencies: Vec<String> = Vec::with_capacity(spec.dependencies.len());
        for dep in &spec.dependencies {
            if !dependencies.contains(dep) {
                dependencies.push(dep.clone());
            }
        }
        Ok(Column {
            name: spec.name.clone(),
            formula,
            dependencies,
            conditions,
            cached_value: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formula(&self) -> &str {
        &self.formula.source
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|c| c.source.as_str())
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    /// Evaluate the formula, then fold the conditions over the result.
    ///
    /// Each condition sees `scope` with this column's name bound to the
    /// value produced by the step before it. `row` only labels errors.
    pub fn compute(&self, engine: &Engine, scope: &dyn Scope, row: usize) -> Result<Value> {
        let mut value = engine
            .eval_expr(&self.formula.expr, scope)
            .map_err(|e| self.eval_error(&self.formula, row, e))?;
        for condition in &self.conditions {
            let next = {
                let bound = Bind::new(scope, &self.name, &value);
                engine
                    .eval_expr(&condition.expr, &bound)
                    .map_err(|e| self.eval_error(condition, row, e))?
            };
            value = next;
        }
        Ok(value)
    }

    /// [`compute`](Self::compute) and remember the result.
    pub fn compute_and_cache(
        &mut self,
        engine: &Engine,
        scope: &dyn Scope,
        row: usize,
    ) -> Result<&Value> {
        let value = self.compute(engine, scope, row)?;
        Ok(self.cached_value.insert(value))
    }

    pub fn cached_value(&self) -> Option<&Value> {
        self.cached_value.as_ref()
    }

    pub fn invalidate_cache(&mut self) {
        self.cached_value = None;
    }

    fn eval_error(&self, expr: &Compiled, row: usize, source: EvalError) -> TableError {
        TableError::Eval {
            column: self.name.clone(),
            expr: expr.source.clone(),
            row,
            source,
        }
    }
}
