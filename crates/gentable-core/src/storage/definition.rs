//! TOML table definitions.
//!
//! ```toml
//! table_condition = "a > 5 ? STOP : CONTINUE"
//!
//! [reference]
//! col1 = [1, 2, 3]
//!
//! [parameters]
//! parameter_x = 10
//!
//! [[columns]]
//! name = "a"
//! formula = 'reference_table["col1"]'
//! ```

use std::path::Path;

use crate::definition::TableDefinition;
use crate::error::Result;

pub fn load_definition(path: &Path) -> Result<TableDefinition> {
    let content = std::fs::read_to_string(path)?;
    let definition = parse_definition(&content)?;
    tracing::debug!(path = %path.display(), columns = definition.columns.len(), "loaded definition");
    Ok(definition)
}

pub fn parse_definition(content: &str) -> Result<TableDefinition> {
    Ok(toml::from_str(content)?)
}
