use anyhow::{Context, Result};
use log::{debug, info};

use crate::cmd;
use crate::config::Config;
use crate::db::KustoBehavior;
use crate::sampledata::{self, ColumnDescriptor, Row, TableDir};

/// What a completed run loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub tables: usize,
    pub rows: usize,
}

pub fn setup_table<C: KustoBehavior>(
    client: &mut C,
    database: &str,
    table: &str,
    schema: &[ColumnDescriptor],
) -> Result<()> {
    println!("\nAttempting to create table {}...", table);
    let csl = cmd::create_table(table, schema);
    let result = client
        .execute(database, &csl)
        .with_context(|| format!("failed to create table {}", table))?;
    debug!("create table {} returned {} rows", table, result.primary_row_count());
    println!("Created table {}!", table);
    Ok(())
}

/// Replaces any mapping of the same name on the table.
pub fn create_json_mapping<C: KustoBehavior>(
    client: &mut C,
    database: &str,
    table: &str,
    mapping_name: &str,
    schema: &[ColumnDescriptor],
) -> Result<()> {
    println!("Attempting to create JSON mapping for table {}...", table);
    let csl = cmd::create_or_alter_json_mapping(table, mapping_name, schema)?;
    client
        .execute_mgmt(database, &csl)
        .with_context(|| {
            format!("failed to create JSON mapping {} for table {}", mapping_name, table)
        })?;
    println!("Created JSON mapping for table {}!", table);
    Ok(())
}

/// One inline ingestion per row, in order. Stops at the first failure.
pub fn ingest_data<C: KustoBehavior>(
    client: &mut C,
    database: &str,
    table: &str,
    mapping_name: &str,
    rows: &[Row],
) -> Result<usize> {
    println!("Attempting to ingest data into {}...", table);
    for (i, row) in rows.iter().enumerate() {
        let csl = cmd::ingest_inline(table, mapping_name, row)?;
        client
            .execute(database, &csl)
            .with_context(|| format!("failed to ingest row {} into {}", i, table))?;
    }
    println!("Data ingested into {}! ({} rows)", table, rows.len());
    Ok(rows.len())
}

/// Schema is read before anything is sent, so a bad schema leaves the table untouched.
pub fn load_table<C: KustoBehavior>(
    client: &mut C,
    config: &Config,
    table: &TableDir,
) -> Result<usize> {
    debug!("loading table {} from {}", table.name, table.path.display());
    let schema = sampledata::load_schema(&table.schema_path())?;

    setup_table(client, &config.database, &table.name, &schema)?;
    create_json_mapping(client, &config.database, &table.name, &config.mapping_name, &schema)?;

    let rows = sampledata::load_rows(&table.data_path())?;
    let count = ingest_data(client, &config.database, &table.name, &config.mapping_name, &rows)?;
    info!("table {}: {} columns, {} rows", table.name, schema.len(), count);
    Ok(count)
}

pub fn load_all<C: KustoBehavior>(client: &mut C, config: &Config) -> Result<LoadSummary> {
    println!("\nSearching for sample data in {}", config.sample_data_dir.display());
    let tables = sampledata::discover_tables(&config.sample_data_dir)?;
    info!("found {} table directories", tables.len());

    let mut summary = LoadSummary::default();
    for table in &tables {
        summary.rows += load_table(client, config, table)?;
        summary.tables += 1;
    }
    Ok(summary)
}
