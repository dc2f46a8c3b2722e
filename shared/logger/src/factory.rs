//! Scoped logger construction.

use crate::error::Result;
use crate::log_level::LogLevel;
use crate::log_writer::LogTarget;
use crate::logger::Logger;
use std::collections::HashMap;
use std::env;

/// Environment variable holding the default level.
pub const LEVEL_ENV: &str = "RTC_LOG_LEVEL";
/// Environment variable holding per-scope overrides, `scope=level,scope=level`.
pub const SCOPES_ENV: &str = "RTC_LOG_SCOPES";

/// Hands out per-scope loggers that share one writer thread.
///
/// # Examples
///
/// ```
/// use logging::{LogLevel, LogTarget, LoggerFactory};
///
/// let mut factory = LoggerFactory::new(&LogTarget::Discard, LogLevel::Info).unwrap();
/// factory.set_scope_level("sctp", LogLevel::Trace);
/// let sctp = factory.new_logger("sctp");
/// assert_eq!(sctp.level(), LogLevel::Trace);
/// ```
#[derive(Debug, Clone)]
pub struct LoggerFactory {
    root: Logger,
    default_level: LogLevel,
    scope_levels: HashMap<String, LogLevel>,
}

impl LoggerFactory {
    /// Creates a factory writing to `target`.
    ///
    /// # Errors
    ///
    /// Returns error if the target cannot be opened.
    pub fn new(target: &LogTarget, default_level: LogLevel) -> Result<Self> {
        Ok(Self {
            root: Logger::with_target(target, LogLevel::Trace)?,
            default_level,
            scope_levels: HashMap::new(),
        })
    }

    /// Creates a factory whose levels come from `RTC_LOG_LEVEL` and `RTC_LOG_SCOPES`.
    ///
    /// # Errors
    ///
    /// Returns error if the target cannot be opened.
    pub fn from_env(target: &LogTarget) -> Result<Self> {
        let default_level = env::var(LEVEL_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LogLevel::Info);

        let mut factory = Self::new(target, default_level)?;
        if let Ok(scopes) = env::var(SCOPES_ENV) {
            factory.apply_scopes(&scopes);
        }
        Ok(factory)
    }

    /// A factory whose loggers record nothing.
    pub fn discard() -> Self {
        Self {
            root: Logger::discard(),
            default_level: LogLevel::Error,
            scope_levels: HashMap::new(),
        }
    }

    /// Overrides the level of one scope.
    pub fn set_scope_level(&mut self, scope: &str, level: LogLevel) {
        self.scope_levels.insert(scope.to_lowercase(), level);
    }

    /// Parses `scope=level` pairs separated by commas; malformed pairs are skipped.
    pub fn apply_scopes(&mut self, spec: &str) {
        for pair in spec.split(',') {
            if let Some((scope, level)) = pair.split_once('=')
                && !scope.trim().is_empty()
                && let Ok(level) = level.parse::<LogLevel>()
            {
                self.set_scope_level(scope.trim(), level);
            }
        }
    }

    /// Level a logger for `scope` would get.
    pub fn level_for(&self, scope: &str) -> LogLevel {
        self.scope_levels
            .get(&scope.to_lowercase())
            .copied()
            .unwrap_or(self.default_level)
    }

    /// Builds the logger for `scope`.
    pub fn new_logger(&self, scope: &str) -> Logger {
        self.root
            .for_component(scope)
            .with_level(self.level_for(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_scope_override() {
        let mut factory = LoggerFactory::new(&LogTarget::Discard, LogLevel::Warn).unwrap();
        factory.apply_scopes("ice=debug, sctp=trace,broken,=info");

        assert_eq!(factory.level_for("ice"), LogLevel::Debug);
        assert_eq!(factory.level_for("SCTP"), LogLevel::Trace);
        assert_eq!(factory.level_for("mux"), LogLevel::Warn);
    }

    #[test]
    fn test_scoped_loggers_share_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("spine.log");

        let mut factory =
            LoggerFactory::new(&LogTarget::File(log_path.clone()), LogLevel::Info).unwrap();
        factory.set_scope_level("sctp", LogLevel::Debug);

        factory.new_logger("mux").debug("hidden");
        factory.new_logger("sctp").debug("association established");
        thread::sleep(Duration::from_millis(50));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(!content.contains("hidden"));
        assert!(content.contains("DEBUG [component: sctp]: association established"));
    }
}
