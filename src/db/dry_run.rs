use std::io::Write;

use crate::db::{CommandResult, KustoBehavior, KustoError};

/// Prints commands instead of sending them.
pub struct DryRun<W: Write> {
    out: W,
    pub issued: usize,
}

impl<W: Write> DryRun<W> {
    pub fn new(out: W) -> Self {
        Self { out, issued: 0 }
    }

    fn print(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError> {
        self.issued += 1;
        // stdout going away is not worth failing a dry run over
        let _ = writeln!(self.out, "[{}] {}", database, csl);
        Ok(CommandResult::default())
    }
}

impl<W: Write> KustoBehavior for DryRun<W> {
    fn execute_mgmt(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError> {
        self.print(database, csl)
    }

    fn execute_query(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError> {
        self.print(database, csl)
    }
}
