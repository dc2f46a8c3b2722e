//! Internal log message structure.

use crate::log_level::LogLevel;
use chrono::Local;

/// Internal representation of a log message.
#[derive(Debug, Clone)]
pub(crate) struct LogMessage {
    pub timestamp: String,
    pub level: LogLevel,
    pub scope: Option<String>,
    pub message: String,
}

impl LogMessage {
    /// Creates a new log message stamped with the local time.
    pub fn new(level: LogLevel, scope: Option<&str>, message: &str) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level,
            scope: scope.map(str::to_string),
            message: message.to_string(),
        }
    }

    /// Formats message for output: `[timestamp] LEVEL [component: scope]: message\n`
    pub fn format(&self) -> String {
        match self.scope {
            Some(ref scope) => format!(
                "[{}] {} [component: {}]: {}\n",
                self.timestamp, self.level, scope, self.message
            ),
            None => format!("[{}] {}: {}\n", self.timestamp, self.level, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_message_format_with_scope() {
        let msg = LogMessage::new(LogLevel::Warn, Some("mux"), "pending queue full");
        let formatted = msg.format();

        assert!(formatted.contains("WARN [component: mux]: pending queue full"));
        assert!(formatted.ends_with('\n'));
    }

    #[test]
    fn test_log_message_format_without_scope() {
        let msg = LogMessage::new(LogLevel::Error, None, "read loop failed");
        assert!(msg.format().contains("ERROR: read loop failed"));
    }

    #[test]
    fn test_timestamp_format() {
        let msg = LogMessage::new(LogLevel::Info, None, "Test");
        let ts = &msg.timestamp;

        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(ts.len(), 23);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[19..20], ".");
    }
}
