//! Diagnostics for the visibility engine
//!
//! Capacity rejections, readback stalls and lifecycle changes are reported
//! through one process-wide `Logger`. Hosts that render their own console
//! swap it with `set_logger`; everything else gets `DefaultLogger`, which
//! prints colored lines to stdout. Errors carry the file and line that
//! raised them.

use colored::*;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Sink for engine diagnostics
///
/// # Example
///
/// ```no_run
/// use perspective_visibility::perspective::log::{set_logger, LogEntry, LogSeverity, Logger};
///
/// struct StallCounter;
///
/// impl Logger for StallCounter {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Warn && entry.source == "perspective::Readback" {
///             // Surface readback stalls in the host's HUD
///         }
///     }
/// }
///
/// set_logger(StallCounter);
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One diagnostic line
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Emitting component, `perspective::Commit` for example
    pub source: String,
    pub message: String,
    /// Set for `engine_error!` only
    pub file: Option<&'static str>,
    /// Set for `engine_error!` only
    pub line: Option<u32>,
}

impl LogEntry {
    fn now(severity: LogSeverity, source: &str, message: String) -> Self {
        Self {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        }
    }
}

/// Ordered from per-frame noise to failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Readback polls, skipped frames
    Trace,
    /// Commit summaries, handle fallbacks
    Debug,
    /// Enable, disable, buffer resizes
    Info,
    /// Stalled readback, camera takeovers, downgraded readback mode
    Warn,
    /// Rejected registrations, failed frames
    Error,
}

impl LogSeverity {
    /// Fixed-width tag printed by `DefaultLogger`
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    fn colored_label(self) -> ColoredString {
        let label = self.label();
        match self {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        }
    }
}

/// Prints `[time] [LEVEL] [source] message`, followed by `(file:line)` when
/// the entry has a location
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let local: DateTime<Local> = entry.timestamp.into();
        let location = match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            _ => String::new(),
        };
        println!(
            "[{}] [{}] [{}] {}{}",
            local.format("%H:%M:%S%.3f"),
            entry.severity.colored_label(),
            entry.source.bright_blue(),
            entry.message,
            location
        );
    }
}

static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger_slot() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn dispatch(entry: LogEntry) {
    if let Ok(logger) = logger_slot().read() {
        logger.log(&entry);
    }
}

/// Route every engine in the process to `logger`
pub fn set_logger<L: Logger + 'static>(logger: L) {
    if let Ok(mut slot) = logger_slot().write() {
        *slot = Box::new(logger);
    }
}

/// Go back to console output
pub fn reset_logger() {
    set_logger(DefaultLogger);
}

/// Backend of the `engine_*!` macros
pub fn log(severity: LogSeverity, source: &str, message: String) {
    dispatch(LogEntry::now(severity, source, message));
}

/// Like `log`, with the raising file and line attached
pub fn log_detailed(
    severity: LogSeverity,
    source: &str,
    message: String,
    file: &'static str,
    line: u32,
) {
    let mut entry = LogEntry::now(severity, source, message);
    entry.file = Some(file);
    entry.line = Some(line);
    dispatch(entry);
}

#[doc(hidden)]
#[macro_export]
macro_rules! __engine_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::LogSeverity::$severity, $source, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Trace, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Debug, $source, $($arg)*) };
}

/// # Example
///
/// ```no_run
/// # use perspective_visibility::engine_info;
/// engine_info!("perspective::VisibilityEngine", "Enabled with {} cells", 256);
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Info, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Warn, $source, $($arg)*) };
}

/// Logs at `Error` with the calling file and line
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
