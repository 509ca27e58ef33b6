use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const SCHEMA_FILE: &str = "schema.json";
pub const DATA_FILE: &str = "data.json";

/// One entry of `schema.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(rename = "ColumnName")]
    pub column_name: String,
    #[serde(rename = "ColumnType")]
    pub column_type: String,
}

pub type Row = Map<String, Value>;

/// A table directory under the sample-data root; its name is the table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDir {
    pub name: String,
    pub path: PathBuf,
}

impl TableDir {
    pub fn schema_path(&self) -> PathBuf {
        self.path.join(SCHEMA_FILE)
    }

    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }
}

/// List table directories in whatever order the filesystem yields them.
pub fn discover_tables(root: &Path) -> Result<Vec<TableDir>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("failed to read sample data directory {}", root.display()))?;

    let mut tables = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            debug!("skipping non-directory {}", path.display());
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        tables.push(TableDir { name, path });
    }
    Ok(tables)
}

pub fn load_schema(path: &Path) -> Result<Vec<ColumnDescriptor>> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let schema: Vec<ColumnDescriptor> = serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse schema JSON at {}", path.display()))?;
    if schema.is_empty() {
        bail!("schema at {} declares no columns", path.display());
    }
    Ok(schema)
}

/// Rows are kept as raw JSON objects; nothing is checked against the schema.
pub fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let rows: Vec<Row> = serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse data JSON at {}", path.display()))?;
    Ok(rows)
}
