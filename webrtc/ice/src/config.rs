//! ICE agent configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::errors::{IceError, Result};
use crate::url::Url;

/// Configuration for the ICE agent
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// STUN/TURN server URLs, e.g. `stun:stun.example.org:3478`
    pub urls: Vec<String>,
    /// Lowest port for host sockets; 0 with `port_max` 0 means ephemeral
    pub port_min: u16,
    pub port_max: u16,
    /// Gather loopback addresses too (useful on a single host)
    pub include_loopback: bool,
    /// Interval between connectivity check rounds
    pub check_interval_ms: u64,
    /// Idle time on the selected pair before a keepalive is sent
    pub keepalive_interval_ms: u64,
    /// Silence from the peer after which the selected pair is dropped
    pub connection_timeout_ms: u64,
    /// How long Dial/Accept wait for a selected pair
    pub connect_timeout_ms: u64,
    /// Wait for a server-reflexive Binding response
    pub stun_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            port_min: 0,
            port_max: 0,
            include_loopback: false,
            check_interval_ms: 2000,
            keepalive_interval_ms: 10000,
            connection_timeout_ms: 10000,
            connect_timeout_ms: 30000,
            stun_timeout_ms: 5000,
        }
    }
}

impl AgentConfig {
    /// Checks the port range and intervals, and parses every server URL.
    pub fn validate(&self) -> Result<Vec<Url>> {
        if self.port_max < self.port_min {
            return Err(IceError::Config(format!(
                "port_max {} below port_min {}",
                self.port_max, self.port_min
            )));
        }
        if self.check_interval_ms == 0 || self.keepalive_interval_ms == 0 {
            return Err(IceError::Config(
                "check and keepalive intervals must be positive".to_string(),
            ));
        }
        self.urls.iter().map(|raw| Url::parse(raw)).collect()
    }

    pub(crate) fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub(crate) fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub(crate) fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn stun_timeout(&self) -> Duration {
        Duration::from_millis(self.stun_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.check_interval_ms, 2000);
        assert_eq!(config.keepalive_interval_ms, 10000);
        assert_eq!(config.connection_timeout_ms, 10000);
        assert_eq!(config.connect_timeout_ms, 30000);
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"urls": ["stun:127.0.0.1:3478"], "include_loopback": true}"#)
                .unwrap();
        assert!(config.include_loopback);
        assert_eq!(config.check_interval_ms, 2000);
        let urls = config.validate().unwrap();
        assert_eq!(urls[0].port, 3478);
    }

    #[test]
    fn test_inverted_port_range_rejected() {
        let config = AgentConfig {
            port_min: 6000,
            port_max: 5000,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(IceError::Config(_))));
    }

    #[test]
    fn test_bad_url_rejected() {
        let config = AgentConfig {
            urls: vec!["stun:google.de?transport=udp".to_string()],
            ..AgentConfig::default()
        };
        assert!(config.validate().unwrap_err().url_kind().is_some());
    }
}
