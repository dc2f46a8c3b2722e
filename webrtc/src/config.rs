//! One configuration file for every layer of the transport.

use std::path::Path;

use config_loader::{ConfigError, Result};
use ice::AgentConfig;
use logging::{LogLevel, LogTarget, LoggerFactory};
use network::{AssociationConfig, MuxConfig};
use serde::Deserialize;

/// File name searched by [`TransportConfig::find_and_load`].
pub const CONFIG_FILE_NAME: &str = "transport.json";

/// Transport configuration
///
/// Every section is optional; missing fields take their defaults.
///
/// ```json
/// {
///   "log_level": "debug",
///   "mux": { "buffer_size": 8192 },
///   "ice": { "urls": ["stun:stun.example.org"], "check_interval_ms": 1000 },
///   "sctp": { "rto_initial_ms": 1000 }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub log_level: String,
    pub mux: MuxConfig,
    pub ice: AgentConfig,
    pub sctp: AssociationConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            mux: MuxConfig::default(),
            ice: AgentConfig::default(),
            sctp: AssociationConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Loads and validates the configuration at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = config_loader::load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Locates `transport.json` (see [`config_loader::find_config_file`])
    /// and loads it.
    pub fn find_and_load() -> Result<Self> {
        let path = config_loader::find_config_file(CONFIG_FILE_NAME)?;
        Self::load(path)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        if self.mux.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "mux: buffer_size must be positive".to_string(),
            ));
        }
        self.ice
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("ice: {}", e)))?;
        self.sctp
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("sctp: {}", e)))?;
        Ok(())
    }

    /// Default level; unknown names fall back to info.
    pub fn log_level(&self) -> LogLevel {
        self.log_level.parse().unwrap_or(LogLevel::Info)
    }

    /// Logger factory at the configured level, with `RTC_LOG_SCOPES`
    /// overrides applied.
    pub fn logger_factory(&self, target: &LogTarget) -> logging::Result<LoggerFactory> {
        let mut factory = LoggerFactory::new(target, self.log_level())?;
        if let Ok(scopes) = std::env::var(logging::SCOPES_ENV) {
            factory.apply_scopes(&scopes);
        }
        Ok(factory)
    }
}
