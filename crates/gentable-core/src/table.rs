//! The table: columns in dependency order, evaluated row by row.
//!
//! Each row is evaluated against a context assembled from, lowest
//! precedence first:
//!
//! - implicit names: `row` (zero-based index) and `reference_table` (a map
//!   of every reference series at this row)
//! - reference series, read at the row index (scalars broadcast)
//! - parameters
//! - columns already computed for this row
//!
//! After all columns are computed the optional table condition is
//! evaluated against the full row context. When it is true the row is
//! dropped and production stops.

use std::collections::{BTreeMap, HashMap};
use std::iter::FusedIterator;

use gentable_engine::{Engine, Layered, Scope, Value, is_valid_name};

use crate::column::{Column, Compiled};
use crate::definition::{ColumnSpec, TableDefinition};
use crate::error::{Result, TableError};
use crate::graph::DependencyGraph;

/// Implicit name bound to the row index.
pub const ROW_NAME: &str = "row";
/// Implicit name bound to the map of reference values.
pub const REFERENCE_TABLE_NAME: &str = "reference_table";
/// Label used for errors raised by the table condition.
pub const TABLE_CONDITION_LABEL: &str = "<table condition>";

#[derive(Clone, Debug)]
pub struct Table {
    pub(crate) engine: Engine,
    pub(crate) columns: Vec<Column>,
    index: HashMap<String, usize>,
    pub(crate) graph: DependencyGraph,
    /// Column indices in evaluation order.
    pub(crate) order: Vec<usize>,
    pub(crate) reference: BTreeMap<String, Value>,
    pub(crate) parameters: BTreeMap<String, Value>,
    table_condition: Option<Compiled>,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table::with_engine(Engine::new())
    }

    /// An empty table evaluating through `engine` (and its function registry).
    pub fn with_engine(engine: Engine) -> Self {
        Table {
            engine,
            columns: Vec::new(),
            index: HashMap::new(),
            graph: DependencyGraph::default(),
            order: Vec::new(),
            reference: BTreeMap::new(),
            parameters: BTreeMap::new(),
            table_condition: None,
        }
    }

    pub fn from_definition(definition: &TableDefinition) -> Result<Self> {
        Table::from_definition_with_engine(definition, Engine::new())
    }

    /// Compile every expression of `definition`. Syntax errors, invalid
    /// names, duplicate columns and dependency cycles all fail here, before
    /// any row is produced.
    pub fn from_definition_with_engine(
        definition: &TableDefinition,
        engine: Engine,
    ) -> Result<Self> {
        let mut table = Table::with_engine(engine);
        for (name, value) in &definition.reference {
            table.set_reference(name, value.clone())?;
        }
        for (name, value) in &definition.parameters {
            table.set_parameter(name, value.clone())?;
        }
        for spec in &definition.columns {
            table.add_column(spec)?;
        }
        table.set_table_condition(definition.table_condition.as_deref())?;
        tracing::debug!(
            columns = table.columns.len(),
            rows = table.row_count(),
            order = ?table.evaluation_order(),
            "table constructed"
        );
        Ok(table)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Add a column after the existing ones.
    ///
    /// Rejects invalid or duplicate names and any declared dependency that
    /// would close a cycle; the table is unchanged on error.
    pub fn add_column(&mut self, spec: &ColumnSpec) -> Result<()> {
        validate_name(&spec.name)?;
        if self.index.contains_key(&spec.name) {
            return Err(TableError::DuplicateColumn(spec.name.clone()));
        }
        let column = Column::compile(spec, &self.engine)?;

        self.columns.push(column);
        match self.rebuild_graph() {
            Ok(()) => {
                self.index.insert(spec.name.clone(), self.columns.len() - 1);
                Ok(())
            }
            Err(e) => {
                self.columns.pop();
                // The previous graph was acyclic, so rebuilding it cannot fail.
                self.rebuild_graph()?;
                Err(e)
            }
        }
    }

    fn rebuild_graph(&mut self) -> Result<()> {
        let graph = DependencyGraph::new(
            self.columns
                .iter()
                .map(|c| (c.name(), c.dependencies())),
        );
        let order = graph.topological_order()?;
        self.graph = graph;
        self.order = order;
        Ok(())
    }

    /// Set (or clear) the expression that ends row production when true.
    pub fn set_table_condition(&mut self, condition: Option<&str>) -> Result<()> {
        self.table_condition = condition
            .map(|source| Compiled::new(&self.engine, TABLE_CONDITION_LABEL, source))
            .transpose()?;
        Ok(())
    }

    pub fn table_condition(&self) -> Option<&str> {
        self.table_condition.as_ref().map(|c| c.source.as_str())
    }

    /// Set a reference series (array) or a scalar broadcast to every row.
    pub fn set_reference(&mut self, name: &str, value: Value) -> Result<()> {
        validate_name(name)?;
        self.reference.insert(name.to_string(), value);
        Ok(())
    }

    /// Set one parameter without touching any cached value.
    ///
    /// Use [`update_parameters`](Self::update_parameters) to also refresh
    /// the columns that depend on it.
    pub fn set_parameter(&mut self, name: &str, value: Value) -> Result<()> {
        validate_name(name)?;
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn reference(&self) -> &BTreeMap<String, Value> {
        &self.reference
    }

    /// Columns in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub(crate) fn column_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Column names in the order they are computed.
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.columns[i].name()).collect()
    }

    /// Minimum length over array-valued reference entries, or 1 when every
    /// entry is a scalar (including when there is no reference data).
    pub fn row_count(&self) -> usize {
        self.reference
            .values()
            .filter_map(Value::as_array)
            .map(<[Value]>::len)
            .min()
            .unwrap_or(1)
    }

    /// Lazily produce rows. Each call starts again from row 0.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            table: self,
            next: 0,
            len: self.row_count(),
            done: false,
        }
    }

    /// Produce every row, stopping at the first error.
    pub fn collect_rows(&self) -> Result<Vec<Row>> {
        self.rows().collect()
    }

    /// Context values shared by every column of row `index`.
    fn row_context(&self, index: usize) -> BTreeMap<String, Value> {
        let at_row: BTreeMap<String, Value> = self
            .reference
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::Array(items) => items.get(index).cloned().unwrap_or(Value::Null),
                    scalar => scalar.clone(),
                };
                (name.clone(), value)
            })
            .collect();

        let mut context = BTreeMap::new();
        context.insert(ROW_NAME.to_string(), Value::Int(index as i64));
        context.insert(
            REFERENCE_TABLE_NAME.to_string(),
            Value::Map(at_row.clone()),
        );
        context.extend(at_row);
        context.extend(
            self.parameters
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        context
    }

    /// Compute row `index`; `None` when the table condition stops production.
    fn produce_row(&self, index: usize) -> Result<Option<Row>> {
        let base = self.row_context(index);
        let mut computed: BTreeMap<String, Value> = BTreeMap::new();

        for &col in &self.order {
            let column = &self.columns[col];
            let value = {
                let scope = Layered::new(vec![&computed as &dyn Scope, &base]);
                column.compute(&self.engine, &scope, index)?
            };
            computed.insert(column.name().to_string(), value);
        }

        if let Some(condition) = &self.table_condition {
            let scope = Layered::new(vec![&computed as &dyn Scope, &base]);
            let stop = self
                .engine
                .eval_expr(&condition.expr, &scope)
                .and_then(|v| v.truthy())
                .map_err(|source| TableError::StopCondition {
                    expr: condition.source.clone(),
                    row: index,
                    source,
                })?;
            if stop {
                tracing::debug!(row = index, condition = %condition.source, "table condition met");
                return Ok(None);
            }
        }

        let values = self
            .columns
            .iter()
            .filter_map(|c| {
                computed
                    .remove(c.name())
                    .map(|value| (c.name().to_string(), value))
            })
            .collect();
        tracing::trace!(row = index, "row computed");
        Ok(Some(Row { index, values }))
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(TableError::InvalidName(name.to_string()))
    }
}

/// One produced row: column values in column insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    index: usize,
    values: Vec<(String, Value)>,
}

impl Row {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lazy row sequence returned by [`Table::rows`].
///
/// Ends after `row_count` rows, when the table condition is met, or right
/// after yielding an error.
pub struct Rows<'a> {
    table: &'a Table,
    next: usize,
    len: usize,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next >= self.len {
            return None;
        }
        let index = self.next;
        self.next += 1;
        match self.table.produce_row(index) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, Some(self.len - self.next))
        }
    }
}

impl FusedIterator for Rows<'_> {}
