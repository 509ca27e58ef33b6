mod dry_run;
mod kusto;

use serde::Deserialize;
use serde_json::Value;

pub use dry_run::DryRun;
pub use kusto::{with_client, KustoError};

/// Operations the loader needs from a Kusto endpoint.
pub trait KustoBehavior {
    /// Run an administrative (control) command.
    fn execute_mgmt(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError>;
    /// Run a query.
    fn execute_query(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError>;

    /// Route by the command text: anything starting with `.` is a control command.
    fn execute(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError> {
        if is_mgmt_command(csl) {
            self.execute_mgmt(database, csl)
        } else {
            self.execute_query(database, csl)
        }
    }
}

pub fn is_mgmt_command(csl: &str) -> bool {
    csl.trim_start().starts_with('.')
}

/// Parsed response body of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandResult {
    pub body: Value,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResultTable {
    pub table_name: String,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl CommandResult {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// Tables of a v1 (`{"Tables": [...]}`) response. Other shapes yield none.
    pub fn tables(&self) -> Vec<ResultTable> {
        self.body
            .get("Tables")
            .and_then(|t| serde_json::from_value(t.clone()).ok())
            .unwrap_or_default()
    }

    /// Row count of the first table, the primary result of a control command.
    pub fn primary_row_count(&self) -> usize {
        self.tables().first().map_or(0, |t| t.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dot_prefix_is_mgmt() {
        assert!(is_mgmt_command(".create table T (a : int)"));
        assert!(is_mgmt_command("  \n.show tables"));
        assert!(!is_mgmt_command("T | take 10"));
    }

    #[test]
    fn v1_tables_are_parsed() {
        let r = CommandResult::new(json!({
            "Tables": [{
                "TableName": "Table_0",
                "Columns": [{"ColumnName": "TableName", "DataType": "String"}],
                "Rows": [["Events"], ["Logs"]]
            }]
        }));
        assert_eq!(r.tables()[0].table_name, "Table_0");
        assert_eq!(r.primary_row_count(), 2);
    }

    #[test]
    fn v2_frames_have_no_tables() {
        let r = CommandResult::new(json!([{"FrameType": "DataSetHeader"}]));
        assert!(r.tables().is_empty());
        assert_eq!(r.primary_row_count(), 0);
    }
}
