/// RosUmd Driver - process-wide services shared by every adapter and device
///
/// The logger is the only process-wide state; device state is per instance.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(LogSeverity::Info as u8);

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

/// Process-wide driver services
///
/// ```no_run
/// use ros_umd::rosumd::Driver;
/// use ros_umd::rosumd::log::{LogSeverity, NullLogger};
///
/// Driver::set_min_severity(LogSeverity::Debug);
/// Driver::set_logger(NullLogger);
/// ```
pub struct Driver;

impl Driver {
    // ===== LOGGER =====

    /// Install `new_logger` for every adapter and device in the process
    pub fn set_logger<L: Logger + 'static>(new_logger: L) {
        Self::install(Box::new(new_logger));
    }

    /// Go back to the stderr logger
    pub fn reset_logger() {
        Self::install(Box::new(DefaultLogger));
    }

    /// Entries below `severity` are dropped before reaching the logger
    pub fn set_min_severity(severity: LogSeverity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> LogSeverity {
        LogSeverity::from_repr(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    fn install(new_logger: Box<dyn Logger>) {
        // A poisoned slot keeps its previous logger
        if let Ok(mut slot) = logger().write() {
            *slot = new_logger;
        }
    }

    // ===== LOGGING =====

    /// Entry point of the `umd_*` macros
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::emit(severity, source, message, None);
    }

    /// Entry point of `umd_error!`, which adds the call site
    pub fn log_detailed(severity: LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        Self::emit(severity, source, message, Some((file, line)));
    }

    fn emit(severity: LogSeverity, source: &str, message: String, location: Option<(&'static str, u32)>) {
        if severity < Self::min_severity() {
            return;
        }
        let entry = LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: location.map(|(file, _)| file),
            line: location.map(|(_, line)| line),
        };
        if let Ok(slot) = logger().read() {
            slot.log(&entry);
        }
    }
}
