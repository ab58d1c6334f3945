//! Logging setup: rank 0 gets a terminal logger (plus a file logger when a
//! log path is given); other ranks stay silent unless `only_main_rank` is
//! disabled. Every module in this crate then logs through the plain
//! `log::*` macros, never through a hand-rolled `message()` call.

use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::Config;
use simplelog::SharedLogger;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;

use crate::parameters::LoggingParameters;

#[derive(Debug)]
pub enum LogInitError {
    Io(std::io::Error),
    AlreadyInitialized,
}

impl std::fmt::Display for LogInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogInitError::Io(e) => write!(f, "failed to create log file: {e}"),
            LogInitError::AlreadyInitialized => write!(f, "a global logger is already set"),
        }
    }
}

impl std::error::Error for LogInitError {}

/// `verbosity` follows a three-level scheme (0 = Info, 1 = Debug, 2+ =
/// Trace).
pub fn level_for_verbosity(verbosity: usize) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global `log` logger for this process. `rank` is this
/// cluster rank (`0` for single-node runs); `log_file`, when given, is
/// additionally written to by every rank permitted to log by
/// `params.only_main_rank`. A no-op (returns `Ok`) if no rank qualifies to
/// log at all, since that is a valid configuration, not an error.
pub fn init(
    rank: i32,
    params: &LoggingParameters,
    log_file: Option<&Path>,
) -> Result<(), LogInitError> {
    let level = level_for_verbosity(params.verbosity);
    let config = Config::default();
    let may_log = rank == 0 || !params.only_main_rank;
    if !may_log {
        return Ok(());
    }

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if rank == 0 {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    if let Some(path) = log_file {
        let file = File::create(path).map_err(LogInitError::Io)?;
        loggers.push(WriteLogger::new(level, config, file));
    }
    if loggers.is_empty() {
        return Ok(());
    }
    CombinedLogger::init(loggers).map_err(|_| LogInitError::AlreadyInitialized)
}
