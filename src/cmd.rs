//! Builders for the Kusto control commands the loader issues.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::sampledata::ColumnDescriptor;

#[derive(Serialize)]
struct MappingEntry<'a> {
    column: &'a str,
    path: String,
    datatype: &'a str,
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Bracket-quote names Kusto would not accept bare, e.g. `my table` -> `['my table']`.
pub fn quote_identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("['{}']", escape_literal(name))
    }
}

/// Escape text for use inside a single-quoted Kusto string literal.
pub fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Escape text for use inside a double-quoted Kusto string literal.
pub fn escape_double_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// JSONPath to a top-level field; names that are not plain identifiers use bracket notation.
pub fn json_path(name: &str) -> String {
    if is_plain_identifier(name) {
        format!("$.{}", name)
    } else {
        format!("$['{}']", escape_literal(name))
    }
}

pub fn create_table(table: &str, schema: &[ColumnDescriptor]) -> String {
    let columns = schema
        .iter()
        .map(|c| format!("{} : {}", quote_identifier(&c.column_name), c.column_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!(".create table {} ({})", quote_identifier(table), columns)
}

/// JSON array mapping every column to the same-named top-level field.
pub fn mapping_json(schema: &[ColumnDescriptor]) -> Result<String> {
    let entries = schema
        .iter()
        .map(|c| MappingEntry {
            column: &c.column_name,
            path: json_path(&c.column_name),
            datatype: &c.column_type,
        })
        .collect::<Vec<_>>();
    Ok(serde_json::to_string(&entries)?)
}

pub fn create_or_alter_json_mapping(
    table: &str,
    mapping_name: &str,
    schema: &[ColumnDescriptor],
) -> Result<String> {
    let mapping = mapping_json(schema)?;
    Ok(format!(
        ".create-or-alter table {} ingestion json mapping \"{}\" '{}'",
        quote_identifier(table),
        escape_double_quoted(mapping_name),
        escape_literal(&mapping)
    ))
}

pub fn ingest_inline(table: &str, mapping_name: &str, row: &Map<String, Value>) -> Result<String> {
    let json = serde_json::to_string(row)?;
    Ok(format!(
        ".ingest inline into table {} with (format='json', ingestionMappingReference='{}') <| {}",
        quote_identifier(table),
        escape_literal(mapping_name),
        json
    ))
}
