//! Thread-safe asynchronous logger implementation.
//!
//! This module provides the main [`Logger`] interface for logging messages
//! without blocking the caller.

use crate::error::Result;
use crate::log_level::LogLevel;
use crate::log_message::LogMessage;
use crate::log_writer::{LogTarget, LogWriter, spawn_writer_thread};
use std::path::PathBuf;
use std::sync::mpsc::{Sender, channel};

/// Thread-safe, non-blocking logger.
///
/// Cloneable instances share the same channel to a dedicated writer thread.
/// A logger built for [`LogTarget::Discard`] has no channel and drops every
/// message after the level check.
///
/// # Examples
///
/// ```
/// use logging::{Logger, LogLevel};
///
/// let logger = Logger::new("app.log".into(), LogLevel::Info).unwrap();
/// logger.info("Application started");
/// let ice = logger.for_component("ice");
/// ice.debug("filtered out");
/// ```
#[derive(Clone)]
pub struct Logger {
    sender: Option<Sender<LogMessage>>,
    level: LogLevel,
    component: Option<String>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("component", &self.component)
            .field("active", &self.sender.is_some())
            .finish()
    }
}

impl Logger {
    /// Creates a new logger appending to `log_path`.
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn new(log_path: PathBuf, level: LogLevel) -> Result<Self> {
        Self::with_target(&LogTarget::File(log_path), level)
    }

    /// Creates a logger writing to `target` through its own writer thread.
    ///
    /// # Errors
    ///
    /// Returns error if the sink cannot be opened or the thread cannot start.
    pub fn with_target(target: &LogTarget, level: LogLevel) -> Result<Self> {
        let sender = match LogWriter::open(target)? {
            Some(writer) => {
                let (sender, receiver) = channel();
                spawn_writer_thread(writer, receiver)?;
                Some(sender)
            }
            None => None,
        };

        Ok(Logger {
            sender,
            level,
            component: None,
        })
    }

    /// A logger that records nothing.
    pub fn discard() -> Self {
        Logger {
            sender: None,
            level: LogLevel::Error,
            component: None,
        }
    }

    /// Derives a logger for `component` that shares this logger's writer thread.
    pub fn for_component(&self, component: &str) -> Self {
        Logger {
            sender: self.sender.clone(),
            level: self.level,
            component: Some(component.to_string()),
        }
    }

    /// Returns a copy with a different minimum level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Minimum recorded level.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether a message at `level` would be recorded.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.sender.is_some() && level >= self.level
    }

    /// Logs a trace message (only if level is Trace).
    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    /// Logs a debug message (only if level is Debug or lower).
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Logs an info message (only if level is Info or lower).
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Logs a warning message (only if level is Warn or lower).
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs an error message (always recorded).
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Filters by level and sends message to writer thread.
    fn log(&self, level: LogLevel, message: &str) {
        if !self.is_enabled(level) {
            return;
        }

        if let Some(ref sender) = self.sender {
            let _ = sender.send(LogMessage::new(level, self.component.as_deref(), message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn wait_for_write() {
        thread::sleep(Duration::from_millis(50));
    }

    #[test]
    fn test_logger_creates_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let logger = Logger::new(log_path.clone(), LogLevel::Debug).unwrap();
        logger.info("Test message");
        wait_for_write();

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Test message"));
    }

    #[test]
    fn test_logger_respects_level() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let logger = Logger::new(log_path.clone(), LogLevel::Warn).unwrap();
        logger.trace("Trace message");
        logger.info("Info message");
        logger.warn("Warn message");
        wait_for_write();

        let content = fs::read_to_string(log_path).unwrap();
        assert!(!content.contains("Trace message"));
        assert!(!content.contains("Info message"));
        assert!(content.contains("Warn message"));
    }

    #[test]
    fn test_for_component_shares_writer() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let root = Logger::new(log_path.clone(), LogLevel::Trace).unwrap();
        let mux = root.for_component("mux");

        thread::spawn(move || {
            mux.trace("dispatched 3 bytes");
        })
        .join()
        .unwrap();
        root.info("root line");
        wait_for_write();

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("TRACE [component: mux]: dispatched 3 bytes"));
        assert!(content.contains("INFO: root line"));
    }

    #[test]
    fn test_discard_logger_is_silent() {
        let logger = Logger::discard();
        assert!(!logger.is_enabled(LogLevel::Error));
        logger.error("goes nowhere");
    }
}
