//! Cached whole-column computation.
//!
//! [`Table::compute_all`] evaluates every column once against whole
//! reference series (formulas broadcast over arrays) and caches each
//! result on its column. Later calls naming changed parameters recompute
//! only the columns that declare a dependency on one of them, plus
//! everything downstream of those, and reuse the cache for the rest.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use gentable_engine::{Layered, Scope, Value};

use crate::error::Result;
use crate::table::{REFERENCE_TABLE_NAME, ROW_NAME, Table, validate_name};

impl Table {
    /// Columns whose declared dependencies mention a changed name, and
    /// every column that depends on those, directly or transitively.
    pub fn affected_columns(&self, changed: &[&str]) -> BTreeSet<String> {
        self.affected_indices(changed)
            .into_iter()
            .map(|i| self.columns[i].name().to_string())
            .collect()
    }

    fn affected_indices(&self, changed: &[&str]) -> HashSet<usize> {
        let direct: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| changed.iter().any(|name| c.depends_on(name)))
            .map(|(i, _)| i)
            .collect();
        let mut affected = self.graph.transitive_dependents(direct.iter().copied());
        affected.extend(direct);
        affected
    }

    /// Whole-column context: reference series as arrays, `row` as the array
    /// of row indices and `reference_table` as the map of every series.
    pub fn column_context(&self) -> BTreeMap<String, Value> {
        let rows = (0..self.row_count())
            .map(|i| Value::Int(i as i64))
            .collect::<Vec<_>>();

        let mut context = BTreeMap::new();
        context.insert(ROW_NAME.to_string(), Value::Array(rows));
        context.insert(
            REFERENCE_TABLE_NAME.to_string(),
            Value::Map(self.reference.clone()),
        );
        context.extend(
            self.reference
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        context.extend(
            self.parameters
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        context
    }

    /// Compute every column against [`column_context`](Self::column_context).
    ///
    /// With an empty `changed` every column is recomputed. Otherwise only
    /// [`affected_columns`](Self::affected_columns) are, along with any
    /// column that has no cached value yet.
    pub fn compute_all(&mut self, changed: &[&str]) -> Result<BTreeMap<String, Value>> {
        let context = self.column_context();
        self.compute_all_with(&context, changed)
    }

    /// [`compute_all`](Self::compute_all) against a caller-supplied context.
    pub fn compute_all_with(
        &mut self,
        context: &dyn Scope,
        changed: &[&str],
    ) -> Result<BTreeMap<String, Value>> {
        let affected = if changed.is_empty() {
            None
        } else {
            Some(self.affected_indices(changed))
        };
        self.compute_internal(context, affected.as_ref())
    }

    /// Set parameters and refresh exactly the columns that depend on the
    /// ones whose value actually changed.
    pub fn update_parameters<I, S>(&mut self, updates: I) -> Result<BTreeMap<String, Value>>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut changed = Vec::new();
        for (name, value) in updates {
            let name = name.into();
            validate_name(&name)?;
            if self.parameters.get(&name) != Some(&value) {
                self.parameters.insert(name.clone(), value);
                changed.push(name);
            }
        }
        let changed: Vec<&str> = changed.iter().map(String::as_str).collect();
        let affected = self.affected_indices(&changed);
        let context = self.column_context();
        self.compute_internal(&context, Some(&affected))
    }

    fn compute_internal(
        &mut self,
        context: &dyn Scope,
        affected: Option<&HashSet<usize>>,
    ) -> Result<BTreeMap<String, Value>> {
        tracing::debug!(
            affected = ?affected.map(|set| {
                let mut names: Vec<&str> = set.iter().map(|&i| self.columns[i].name()).collect();
                names.sort_unstable();
                names
            }),
            "computing columns"
        );

        let Table {
            engine,
            columns,
            order,
            ..
        } = self;

        let mut computed: BTreeMap<String, Value> = BTreeMap::new();
        for &col in order.iter() {
            let column = &mut columns[col];
            let stale = affected.is_none_or(|set| set.contains(&col));
            let value = match column.cached_value() {
                Some(cached) if !stale => cached.clone(),
                _ => {
                    let scope = Layered::new(vec![&computed as &dyn Scope, context]);
                    column.compute_and_cache(engine, &scope, 0)?.clone()
                }
            };
            computed.insert(column.name().to_string(), value);
        }
        Ok(computed)
    }

    /// Drop the cached value of `column` and of everything downstream of it.
    pub fn invalidate(&mut self, column: &str) -> Result<()> {
        let start = self.column_index(column)?;
        let mut stale = self.graph.transitive_dependents([start]);
        stale.insert(start);
        for i in stale {
            self.columns[i].invalidate_cache();
        }
        Ok(())
    }

    pub fn invalidate_all(&mut self) {
        for column in &mut self.columns {
            column.invalidate_cache();
        }
    }

    /// Value cached by the last [`compute_all`](Self::compute_all).
    pub fn cached_value(&self, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.cached_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ColumnSpec;
    use crate::error::TableError;

    fn scenario() -> Table {
        let mut table = Table::new();
        table
            .set_reference("col1", Value::from(vec![1i64, 2, 3]))
            .unwrap();
        table.set_parameter("parameter_x", Value::Int(10)).unwrap();
        table
            .add_column(&ColumnSpec::new("a", "reference_table[\"col1\"]"))
            .unwrap();
        table
            .add_column(&ColumnSpec::new("b", "a * 2").depends_on(["a"]))
            .unwrap();
        table
            .add_column(&ColumnSpec::new("c", "b * parameter_x").depends_on(["b", "parameter_x"]))
            .unwrap();
        table
    }

    fn ints(values: &[i64]) -> Value {
        Value::from(values.to_vec())
    }

    #[test]
    fn test_vectorized_scenario() {
        let mut table = scenario();
        let out = table.compute_all(&[]).unwrap();
        assert_eq!(out["a"], ints(&[1, 2, 3]));
        assert_eq!(out["b"], ints(&[2, 4, 6]));
        assert_eq!(out["c"], ints(&[20, 40, 60]));
        assert_eq!(table.cached_value("c"), Some(&ints(&[20, 40, 60])));
    }

    #[test]
    fn test_affected_columns_propagate_downstream() {
        let mut table = scenario();
        table
            .add_column(&ColumnSpec::new("d", "c + 1").depends_on(["c"]))
            .unwrap();
        let affected = table.affected_columns(&["parameter_x"]);
        assert_eq!(
            affected.into_iter().collect::<Vec<_>>(),
            vec!["c".to_string(), "d".to_string()]
        );
        assert!(table.affected_columns(&["unrelated"]).is_empty());
        assert_eq!(table.affected_columns(&["a"]).len(), 3);
    }

    #[test]
    fn test_incremental_recomputes_only_affected() {
        let mut table = scenario();
        table.compute_all(&[]).unwrap();

        // Changing the reference behind a's back proves a and b come from cache.
        table
            .set_reference("col1", Value::from(vec![100i64, 200, 300]))
            .unwrap();
        table.set_parameter("parameter_x", Value::Int(20)).unwrap();
        let out = table.compute_all(&["parameter_x"]).unwrap();
        assert_eq!(out["a"], ints(&[1, 2, 3]));
        assert_eq!(out["b"], ints(&[2, 4, 6]));
        assert_eq!(out["c"], ints(&[40, 80, 120]));
    }

    #[test]
    fn test_incremental_matches_full_recompute() {
        let mut incremental = scenario();
        incremental.compute_all(&[]).unwrap();
        incremental
            .set_parameter("parameter_x", Value::Float(0.5))
            .unwrap();
        let partial = incremental.compute_all(&["parameter_x"]).unwrap();

        let mut full = scenario();
        full.set_parameter("parameter_x", Value::Float(0.5)).unwrap();
        assert_eq!(partial, full.compute_all(&[]).unwrap());
    }

    #[test]
    fn test_update_parameters_skips_unchanged_values() {
        let mut table = scenario();
        table.compute_all(&[]).unwrap();
        table
            .set_reference("col1", Value::from(vec![0i64, 0, 0]))
            .unwrap();

        let out = table
            .update_parameters([("parameter_x", Value::Int(10))])
            .unwrap();
        assert_eq!(out["c"], ints(&[20, 40, 60]));

        let out = table
            .update_parameters([("parameter_x", Value::Int(20))])
            .unwrap();
        assert_eq!(out["c"], ints(&[40, 80, 120]));
        assert_eq!(table.parameters()["parameter_x"], Value::Int(20));
    }

    #[test]
    fn test_columns_without_cache_are_always_computed() {
        let mut table = scenario();
        let out = table.compute_all(&["parameter_x"]).unwrap();
        assert_eq!(out["a"], ints(&[1, 2, 3]));
    }

    #[test]
    fn test_invalidate_clears_downstream() {
        let mut table = scenario();
        table.compute_all(&[]).unwrap();
        table.invalidate("b").unwrap();
        assert!(table.cached_value("a").is_some());
        assert!(table.cached_value("b").is_none());
        assert!(table.cached_value("c").is_none());

        table.invalidate_all();
        assert!(table.cached_value("a").is_none());
        assert!(matches!(
            table.invalidate("zzz"),
            Err(TableError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_conditions_broadcast_in_whole_column_mode() {
        let mut table = Table::new();
        table
            .set_reference("x", Value::from(vec![5i64, 50, 500]))
            .unwrap();
        table.set_parameter("epsilon", Value::Int(100)).unwrap();
        table
            .add_column(
                &ColumnSpec::new("c", "x * 2")
                    .condition("0 if c > epsilon else c")
                    .condition("-1 if c == 10 else c"),
            )
            .unwrap();
        let out = table.compute_all(&[]).unwrap();
        assert_eq!(out["c"], ints(&[-1, 100, 0]));
    }

    #[test]
    fn test_caller_supplied_context() {
        let mut table = scenario();
        let mut context = table.column_context();
        context.insert("parameter_x".to_string(), Value::Int(1));
        let out = table.compute_all_with(&context, &[]).unwrap();
        assert_eq!(out["c"], ints(&[2, 4, 6]));
    }
}
