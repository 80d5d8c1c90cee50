//! Logging infrastructure for the berth library.
//!
//! Library code logs through the `log` facade. This module supplies the
//! stderr backend the CLI installs, with three coarse verbosity levels.

use std::env;
use std::fmt;

/// Environment variable consulted when no verbosity flag is given.
pub const LOG_MODE_ENV: &str = "BERTH_LOG_MODE";

/// Logging level for controlling output verbosity.
///
/// Log levels are ordered from least verbose (Quiet) to most verbose (Verbose).
///
/// # Examples
///
/// ```
/// use berth::LogLevel;
///
/// assert!(LogLevel::Quiet < LogLevel::Normal);
/// assert!(LogLevel::Normal < LogLevel::Verbose);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Errors only.
    Quiet,
    /// Errors and warnings.
    Normal,
    /// Everything, including info and debug messages.
    Verbose,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiet => write!(f, "quiet"),
            Self::Normal => write!(f, "normal"),
            Self::Verbose => write!(f, "verbose"),
        }
    }
}

impl LogLevel {
    /// Parses a log level from a string (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not recognized.
    ///
    /// # Examples
    ///
    /// ```
    /// use berth::LogLevel;
    ///
    /// assert_eq!(LogLevel::parse("quiet").unwrap(), LogLevel::Quiet);
    /// assert_eq!(LogLevel::parse("VERBOSE").unwrap(), LogLevel::Verbose);
    /// assert!(LogLevel::parse("invalid").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "normal" => Ok(Self::Normal),
            "verbose" => Ok(Self::Verbose),
            _ => Err(format!("invalid log level: {s}")),
        }
    }

    /// The most verbose `log` level let through at this setting.
    #[must_use]
    pub const fn filter(self) -> log::LevelFilter {
        match self {
            Self::Quiet => log::LevelFilter::Error,
            Self::Normal => log::LevelFilter::Warn,
            Self::Verbose => log::LevelFilter::Debug,
        }
    }
}

/// A stderr logger backing the `log` facade.
///
/// # Examples
///
/// ```
/// use berth::{Logger, LogLevel};
///
/// let logger = Logger::new(LogLevel::Normal);
/// assert_eq!(logger.level(), LogLevel::Normal);
/// ```
#[derive(Debug)]
pub struct Logger {
    level: LogLevel,
}

impl Logger {
    /// Creates a new logger with the specified log level.
    #[must_use]
    pub const fn new(level: LogLevel) -> Self {
        Self { level }
    }

    /// Returns the current log level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Installs this logger as the global `log` backend.
    ///
    /// Only the first call in a process takes effect; later calls are
    /// ignored so tests and embedders can call this freely.
    pub fn install(self) {
        let filter = self.level.filter();
        if log::set_boxed_logger(Box::new(self)).is_ok() {
            log::set_max_level(filter);
        }
    }

    fn prefix(level: log::Level) -> &'static str {
        match level {
            log::Level::Error => "ERROR",
            log::Level::Warn => "WARN",
            log::Level::Info => "INFO",
            log::Level::Debug | log::Level::Trace => "DEBUG",
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Normal)
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.level.filter()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}", Self::prefix(record.level()), record.args());
        }
    }

    fn flush(&self) {}
}

/// Builds a logger from CLI flags and the environment.
///
/// The priority order is:
/// 1. CLI flags (`verbose` wins over `quiet`)
/// 2. `BERTH_LOG_MODE` environment variable
/// 3. Default (Normal)
///
/// # Examples
///
/// ```
/// use berth::{init_logger, LogLevel};
///
/// assert_eq!(init_logger(true, false).level(), LogLevel::Verbose);
/// assert_eq!(init_logger(false, true).level(), LogLevel::Quiet);
/// ```
#[must_use]
pub fn init_logger(verbose: bool, quiet: bool) -> Logger {
    if verbose {
        return Logger::new(LogLevel::Verbose);
    }
    if quiet {
        return Logger::new(LogLevel::Quiet);
    }

    if let Ok(env_value) = env::var(LOG_MODE_ENV) {
        if let Ok(level) = LogLevel::parse(&env_value) {
            return Logger::new(level);
        }
    }

    Logger::new(LogLevel::Normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use serial_test::serial;

    #[test]
    fn test_log_level_display() {
        assert_eq!(format!("{}", LogLevel::Quiet), "quiet");
        assert_eq!(format!("{}", LogLevel::Normal), "normal");
        assert_eq!(format!("{}", LogLevel::Verbose), "verbose");
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("Normal").unwrap(), LogLevel::Normal);
        assert!(LogLevel::parse("").is_err());
    }

    #[test]
    fn test_filters() {
        let quiet = Logger::new(LogLevel::Quiet);
        let warn = log::Metadata::builder().level(log::Level::Warn).build();
        let error = log::Metadata::builder().level(log::Level::Error).build();
        assert!(!quiet.enabled(&warn));
        assert!(quiet.enabled(&error));

        let verbose = Logger::new(LogLevel::Verbose);
        let debug = log::Metadata::builder().level(log::Level::Debug).build();
        assert!(verbose.enabled(&debug));
        assert!(!Logger::default().enabled(&debug));
    }

    #[test]
    #[serial]
    fn test_init_logger_defaults() {
        let saved = env::var(LOG_MODE_ENV).ok();
        env::remove_var(LOG_MODE_ENV);

        assert_eq!(init_logger(false, false).level(), LogLevel::Normal);

        if let Some(val) = saved {
            env::set_var(LOG_MODE_ENV, val);
        }
    }

    #[test]
    fn test_init_logger_verbose_takes_precedence() {
        assert_eq!(init_logger(true, true).level(), LogLevel::Verbose);
    }

    #[test]
    #[serial]
    fn test_init_logger_from_env() {
        let saved = env::var(LOG_MODE_ENV).ok();

        env::set_var(LOG_MODE_ENV, "verbose");
        assert_eq!(init_logger(false, false).level(), LogLevel::Verbose);

        env::set_var(LOG_MODE_ENV, "invalid");
        assert_eq!(init_logger(false, false).level(), LogLevel::Normal);

        env::set_var(LOG_MODE_ENV, "normal");
        assert_eq!(init_logger(false, true).level(), LogLevel::Quiet);

        match saved {
            Some(val) => env::set_var(LOG_MODE_ENV, val),
            None => env::remove_var(LOG_MODE_ENV),
        }
    }

    #[test]
    fn test_install_twice_keeps_first_logger() {
        Logger::new(LogLevel::Quiet).install();
        Logger::new(LogLevel::Verbose).install();
        assert_ne!(log::max_level(), log::LevelFilter::Off);
        log::error!("logger installed");
    }
}
