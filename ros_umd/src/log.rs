//! Driver logging
//!
//! Every module reports through the `umd_*` macros, which hand a [`LogEntry`]
//! to the logger installed in the [`Driver`](crate::rosumd::Driver). Hosts
//! embedding the driver replace [`DefaultLogger`] with their own sink (a
//! debugger channel, a trace provider, a test capture).
//!
//! ERROR entries carry the file and line of the macro call.

use std::fmt;
use std::time::SystemTime;
use chrono::{DateTime, Local};
use colored::*;

/// Destination for driver log entries
///
/// # Example
///
/// ```no_run
/// use ros_umd::rosumd::log::{Logger, LogEntry};
///
/// struct DebuggerLogger;
///
/// impl Logger for DebuggerLogger {
///     fn log(&self, entry: &LogEntry) {
///         // OutputDebugString(&entry.to_string())
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log message with its origin
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Component that logged, e.g. "rosumd::Device" or "rosumd::SoftKernel"
    pub source: String,
    pub message: String,
    /// Set for ERROR entries only
    pub file: Option<&'static str>,
    /// Set for ERROR entries only
    pub line: Option<u32>,
}

impl LogEntry {
    /// `file:line` of the call, when recorded
    pub fn location(&self) -> Option<String> {
        match (self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            _ => None,
        }
    }

    fn local_time(&self) -> String {
        let datetime: DateTime<Local> = self.timestamp.into();
        datetime.format("%H:%M:%S%.3f").to_string()
    }
}

/// Plain rendering: `[time] [SEVERITY] [source] message (file:line)`
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] [{}] {}", self.local_time(), self.severity.label(), self.source, self.message)?;
        if let Some(location) = self.location() {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogSeverity {
    /// Per-record and per-map tracing
    Trace,
    /// Kernel calls and flushes
    Debug,
    /// Device lifecycle (standup, teardown, context destruction)
    Info,
    /// Rejected calls and host-side anomalies
    Warn,
    /// Failures returned to the caller
    Error,
}

impl LogSeverity {
    /// Fixed-width label used in console output
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    /// Inverse of `severity as u8`; out-of-range values saturate to Error
    pub(crate) fn from_repr(value: u8) -> Self {
        match value {
            0 => LogSeverity::Trace,
            1 => LogSeverity::Debug,
            2 => LogSeverity::Info,
            3 => LogSeverity::Warn,
            _ => LogSeverity::Error,
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

/// Colored stderr logger installed until the host sets its own
///
/// User-mode drivers run inside the application's process, so stdout is left
/// to the application.
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let mut line = format!("[{}] [{}] [{}] {}",
            entry.local_time(), entry.severity.colored_label(), entry.source.bright_blue(), entry.message);
        if let Some(location) = entry.location() {
            line.push_str(&format!(" ({})", location.dimmed()));
        }
        eprintln!("{}", line);
    }
}

/// Discards everything
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _entry: &LogEntry) {}
}

// ===== LOGGING MACROS =====

#[doc(hidden)]
#[macro_export]
macro_rules! __umd_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::rosumd::Driver::log(
            $crate::rosumd::log::LogSeverity::$severity,
            $source,
            format!($($arg)*),
        )
    };
}

/// Log at TRACE
#[macro_export]
macro_rules! umd_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__umd_log!(Trace, $source, $($arg)*) };
}

/// Log at DEBUG
///
/// ```ignore
/// umd_debug!("rosumd::CommandBuffer", "flushed {} bytes", len);
/// ```
#[macro_export]
macro_rules! umd_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__umd_log!(Debug, $source, $($arg)*) };
}

#[macro_export]
macro_rules! umd_info {
    ($source:expr, $($arg:tt)*) => { $crate::__umd_log!(Info, $source, $($arg)*) };
}

#[macro_export]
macro_rules! umd_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__umd_log!(Warn, $source, $($arg)*) };
}

/// Log at ERROR, recording the call site
#[macro_export]
macro_rules! umd_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::rosumd::Driver::log_detailed(
            $crate::rosumd::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
