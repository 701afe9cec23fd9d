//! gentable-core - columns, dependency ordering, row generation and
//! incremental recompute on top of the gentable formula engine.

pub mod column;
pub mod definition;
pub mod error;
pub mod graph;
mod incremental;
pub mod storage;
pub mod table;

pub use column::Column;
pub use definition::{ColumnSpec, TableDefinition};
pub use error::{Result, TableError};
pub use graph::DependencyGraph;
pub use table::{Row, Rows, Table};

pub use gentable_engine::{Engine, Value};
