//! CSV reference import and row export.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use gentable_engine::Value;

use crate::error::{Result, TableError};
use crate::table::Row;

/// Read reference series from a CSV file with a header row.
pub fn parse_reference_csv(path: &Path) -> Result<BTreeMap<String, Value>> {
    let content = std::fs::read_to_string(path)?;
    let reference = parse_reference_csv_content(&content)?;
    tracing::debug!(path = %path.display(), series = reference.len(), "loaded reference csv");
    Ok(reference)
}

/// Each header names one series; each following line adds one element to
/// every series. Numbers become `int`/`float`, empty fields `None`, and
/// everything else stays a string.
pub fn parse_reference_csv_content(content: &str) -> Result<BTreeMap<String, Value>> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(TableError::Csv {
            line: 1,
            message: "file is empty".to_string(),
        });
    };
    let names = parse_csv_line(header);
    for (i, name) in names.iter().enumerate() {
        if name.is_empty() {
            return Err(TableError::Csv {
                line: 1,
                message: format!("header field {} is empty", i + 1),
            });
        }
        if names[..i].contains(name) {
            return Err(TableError::Csv {
                line: 1,
                message: format!("duplicate header '{}'", name),
            });
        }
    }

    let mut series: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for (line_idx, line) in lines {
        let fields = parse_csv_line(line);
        if fields.len() != names.len() {
            return Err(TableError::Csv {
                line: line_idx + 1,
                message: format!("expected {} fields, found {}", names.len(), fields.len()),
            });
        }
        for (values, field) in series.iter_mut().zip(&fields) {
            values.push(parse_csv_field(field));
        }
    }

    Ok(names
        .into_iter()
        .zip(series)
        .map(|(name, values)| (name, Value::Array(values)))
        .collect())
}

/// Parse a single CSV line, handling quoted fields
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field_was_quoted = true;
                }
                ',' => {
                    let field = std::mem::take(&mut current);
                    fields.push(if field_was_quoted {
                        field
                    } else {
                        field.trim().to_string()
                    });
                    field_was_quoted = false;
                }
                _ => current.push(c),
            }
        }
    }
    fields.push(if field_was_quoted {
        current
    } else {
        current.trim().to_string()
    });
    fields
}

/// Numbers with leading zeros (`007`) and fields with surrounding
/// whitespace stay text.
pub(crate) fn parse_csv_field(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    let trimmed = field.trim();
    if field != trimmed {
        return Value::Str(field.to_string());
    }

    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if digits.starts_with('0')
        && digits.len() > 1
        && digits.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    {
        return Value::Str(trimmed.to_string());
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    // Rust also accepts "inf"/"nan"; keep those as text.
    match trimmed.parse::<f64>() {
        Ok(f) if trimmed.chars().any(|c| c.is_ascii_digit()) => Value::Float(f),
        _ => Value::Str(trimmed.to_string()),
    }
}

/// Write a header line and one line per row.
pub fn write_csv<W: Write>(out: &mut W, columns: &[&str], rows: &[Row]) -> std::io::Result<()> {
    let header: Vec<String> = columns.iter().map(|c| escape_csv_field(c)).collect();
    writeln!(out, "{}", header.join(","))?;
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|name| row.get(name).map_or_else(String::new, csv_value))
            .collect();
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}

pub fn write_csv_content(columns: &[&str], rows: &[Row]) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_csv(&mut out, columns, rows);
    String::from_utf8_lossy(&out).into_owned()
}

fn csv_value(value: &Value) -> String {
    match value {
        Value::Str(s) => escape_csv_field(s),
        Value::Null => String::new(),
        other => escape_csv_field(&other.to_string()),
    }
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    // Guard against CSV formula injection in spreadsheet apps; numbers
    // such as "-1" are left alone.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let looks_numeric = field.trim().parse::<f64>().is_ok();
    let safe_field = if !looks_numeric && matches!(first_non_space, Some('=' | '+' | '-' | '@')) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}
