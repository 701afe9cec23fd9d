//! Markdown export.

use std::io::Write;

use gentable_engine::Value;

use crate::table::Row;

/// Write rows as a Markdown table, one column per name, with the row index
/// in the first column.
pub fn write_markdown<W: Write>(
    out: &mut W,
    columns: &[&str],
    rows: &[Row],
) -> std::io::Result<()> {
    if columns.is_empty() {
        return writeln!(out, "*Empty table*");
    }

    write!(out, "| row |")?;
    for name in columns {
        write!(out, " {} |", escape_markdown(name))?;
    }
    writeln!(out)?;

    write!(out, "|---|")?;
    for _ in columns {
        write!(out, "---|")?;
    }
    writeln!(out)?;

    for row in rows {
        write!(out, "| {} |", row.index())?;
        for name in columns {
            let display = row.get(name).map(Value::to_string).unwrap_or_default();
            write!(out, " {} |", escape_markdown(&display))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_markdown_content(columns: &[&str], rows: &[Row]) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_markdown(&mut out, columns, rows);
    String::from_utf8_lossy(&out).into_owned()
}

fn escape_markdown(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ").replace('\r', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ColumnSpec;
    use crate::table::Table;

    #[test]
    fn test_markdown_table() {
        let mut table = Table::new();
        table
            .set_reference("x", Value::from(vec![1i64, 2]))
            .unwrap();
        table.add_column(&ColumnSpec::new("a", "x * 10")).unwrap();
        table.add_column(&ColumnSpec::new("p", "'a|b'")).unwrap();
        let rows = table.collect_rows().unwrap();
        let expected = "\
| row | a | p |
|---|---|---|
| 0 | 10 | a\\|b |
| 1 | 20 | a\\|b |
";
        assert_eq!(write_markdown_content(&["a", "p"], &rows), expected);
    }

    #[test]
    fn test_no_columns() {
        assert_eq!(write_markdown_content(&[], &[]), "*Empty table*\n");
    }
}
