//! Declarative table definitions.
//!
//! A [`TableDefinition`] is plain data (deserializable from TOML, see
//! [`crate::storage::definition`]) that [`Table::from_definition`] compiles.
//!
//! [`Table::from_definition`]: crate::Table::from_definition

use std::collections::BTreeMap;

use gentable_engine::Value;
use serde::{Deserialize, Serialize};

/// One column: a formula, the names it declares it depends on, and the
/// post-formula conditions applied in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub formula: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> Self {
        ColumnSpec {
            name: name.into(),
            formula: formula.into(),
            dependencies: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Columns in insertion order.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    /// Name to scalar or array; arrays are read one element per row.
    #[serde(default)]
    pub reference: BTreeMap<String, Value>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_condition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = ColumnSpec::new("c", "b * parameter_x")
            .depends_on(["b", "parameter_x"])
            .condition("0 if c > epsilon else c");
        assert_eq!(spec.dependencies, vec!["b", "parameter_x"]);
        assert_eq!(spec.conditions.len(), 1);
    }
}
