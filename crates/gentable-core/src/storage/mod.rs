//! Loading table definitions and reference data, and writing rows out.

pub mod csv;
pub mod definition;
pub mod md;

pub use csv::{parse_reference_csv, parse_reference_csv_content, write_csv, write_csv_content};
pub use definition::{load_definition, parse_definition};
pub use md::{write_markdown, write_markdown_content};
