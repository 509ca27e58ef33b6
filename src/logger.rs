use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_ENV: &str = "KUSTO_SEED_LOG";

/// Log target that only reaches the log file, for messages already shown to the user.
pub const FILE_ONLY: &str = "kusto_seed::file_only";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn parse(value: &str) -> LogLevel {
        match value.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    fn from_env() -> LogLevel {
        LogLevel::parse(&std::env::var(LOG_ENV).unwrap_or_default())
    }

    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn base_config() -> ConfigBuilder {
    let mut builder = ConfigBuilder::new();
    builder
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off);
    builder
}

fn file_config() -> Config {
    base_config().build()
}

fn terminal_config() -> Config {
    base_config().add_filter_ignore_str(FILE_ONLY).build()
}

/// Install the terminal logger and, if `log_path` can be opened, a file logger.
///
/// The terminal only shows warnings unless `verbose`; progress goes to stdout separately.
/// Returns the log file path when one is in use.
pub fn init(log_path: Option<&Path>, verbose: bool) -> Option<PathBuf> {
    let config = file_config();

    let term_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        terminal_config(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let opened = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        loggers.push(WriteLogger::new(LogLevel::from_env().filter(), config, file));
        Some(path.to_path_buf())
    });

    // A second init (tests, embedding) keeps the first logger.
    let _ = CombinedLogger::init(loggers);
    if let Some(path) = &opened {
        log::info!("logging initialized: {}", path.display());
    }
    opened
}
