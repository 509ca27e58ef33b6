mod cmd;
mod config;
mod connection;
mod db;
mod loader;
mod logger;
mod sampledata;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::error;

use crate::config::Config;
use crate::connection::Connection;
use crate::db::{with_client, DryRun};
use crate::loader::{load_all, LoadSummary};

/// Create tables and load sample records into a local Kusto emulator.
#[derive(Debug, Parser)]
#[command(name = "kusto-seed", version, about)]
struct Cli {
    /// YAML config file (defaults to <config dir>/kusto-seed/config.yaml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emulator endpoint URI
    #[arg(long)]
    endpoint: Option<String>,

    /// Target database
    #[arg(long)]
    database: Option<String>,

    /// Root directory with one subdirectory per table
    #[arg(long = "sample-data")]
    sample_data: Option<PathBuf>,

    /// Bearer token sent to the emulator
    #[arg(long)]
    token: Option<String>,

    /// Name of the JSON ingestion mapping created on every table
    #[arg(long)]
    mapping_name: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the commands instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Log file (defaults to <config dir>/kusto-seed/kusto-seed.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn resolve(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(v) = &self.endpoint {
            config.endpoint = v.clone();
        }
        if let Some(v) = &self.database {
            config.database = v.clone();
        }
        if let Some(v) = &self.sample_data {
            config.sample_data_dir = v.clone();
        }
        if let Some(v) = &self.token {
            config.token = v.clone();
        }
        if let Some(v) = &self.mapping_name {
            config.mapping_name = v.clone();
        }
        if let Some(v) = self.timeout_secs {
            config.timeout_secs = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<LoadSummary> {
    let config = cli.resolve()?;

    if cli.dry_run {
        let mut printer = DryRun::new(std::io::stdout());
        let summary = load_all(&mut printer, &config)?;
        log::info!("dry run printed {} commands", printer.issued);
        return Ok(summary);
    }

    let conn = Connection::from_config(&config);
    println!("Setting up connection with {}...", conn.endpoint);
    with_client(&conn, |client| load_all(client, &config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().or_else(|| {
        crate::config::get_app_config_path()
            .ok()
            .map(|dir| dir.join("kusto-seed.log"))
    });
    logger::init(log_path.as_deref(), cli.verbose);

    match run(&cli) {
        Ok(summary) => {
            log::info!("loaded {} tables, {} rows", summary.tables, summary.rows);
            println!("\nDone Loading sample data!");
            Ok(())
        }
        Err(err) => {
            // main prints the error itself on the way out
            error!(target: logger::FILE_ONLY, "fatal error: {:#}", err);
            Err(err)
        }
    }
}
