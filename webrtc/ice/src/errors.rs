//! Error types for ICE operations.
//!
//! This module defines all possible errors that can occur while gathering
//! candidates, running connectivity checks and parsing ICE server URLs.

use network::NetworkError;
use stun::StunError;

/// Classification of an ICE server URL failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlErrorKind {
    /// Malformed scheme, host, port or query
    Syntax,
    /// Well-formed but asks for something we do not implement
    NotSupported,
    /// Anything the parser could not classify
    Unknown,
}

impl std::fmt::Display for UrlErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlErrorKind::Syntax => write!(f, "syntax error"),
            UrlErrorKind::NotSupported => write!(f, "not supported"),
            UrlErrorKind::Unknown => write!(f, "unknown error"),
        }
    }
}

/// Errors that can occur during ICE operations.
#[derive(Debug, Clone, PartialEq)]
pub enum IceError {
    /// ICE server URL could not be parsed
    Url {
        kind: UrlErrorKind,
        reason: &'static str,
    },
    /// Invalid candidate attribute
    InvalidCandidate(String),
    /// Agent or connection was closed
    Closed,
    /// Dial or Accept was already called on this agent
    AlreadyStarted,
    /// Remote ufrag or pwd is empty
    MissingCredentials,
    /// No candidate pair has been selected yet
    NoValidPair,
    /// No local interface produced a candidate
    NoCandidates,
    /// Every port of the configured range is taken
    PortExhausted { port_min: u16, port_max: u16 },
    /// Server-reflexive discovery failed
    StunProbe(String),
    /// Socket operation error
    Io(String),
    /// Connectivity was not established in time
    Timeout,
    /// Configuration error
    Config(String),
}

pub type Result<T> = std::result::Result<T, IceError>;

impl IceError {
    pub(crate) fn syntax(reason: &'static str) -> Self {
        IceError::Url {
            kind: UrlErrorKind::Syntax,
            reason,
        }
    }

    /// URL classification, `None` for other errors.
    pub fn url_kind(&self) -> Option<UrlErrorKind> {
        match self {
            IceError::Url { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl std::fmt::Display for IceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IceError::Url { kind, reason } => write!(f, "{}: {}", kind, reason),
            IceError::InvalidCandidate(c) => write!(f, "Invalid candidate: {}", c),
            IceError::Closed => write!(f, "Agent is closed"),
            IceError::AlreadyStarted => write!(f, "Attempted to start agent twice"),
            IceError::MissingCredentials => write!(f, "Remote ufrag and pwd are required"),
            IceError::NoValidPair => write!(f, "No valid candidate pair"),
            IceError::NoCandidates => write!(f, "No candidates available"),
            IceError::PortExhausted { port_min, port_max } => {
                write!(f, "No free port in range {}-{}", port_min, port_max)
            }
            IceError::StunProbe(e) => write!(f, "STUN probe failed: {}", e),
            IceError::Io(e) => write!(f, "Socket error: {}", e),
            IceError::Timeout => write!(f, "Timed out waiting for connectivity"),
            IceError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for IceError {}

impl From<std::io::Error> for IceError {
    fn from(err: std::io::Error) -> Self {
        IceError::Io(err.to_string())
    }
}

impl From<StunError> for IceError {
    fn from(err: StunError) -> Self {
        IceError::StunProbe(err.to_string())
    }
}

impl From<IceError> for NetworkError {
    fn from(err: IceError) -> Self {
        match err {
            IceError::Closed => NetworkError::Closed,
            IceError::Timeout => NetworkError::Timeout,
            IceError::Io(e) => NetworkError::Io(std::io::Error::other(e)),
            other => NetworkError::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_error_display() {
        let err = IceError::syntax("invalid scheme type");
        assert_eq!(err.to_string(), "syntax error: invalid scheme type");
        assert_eq!(err.url_kind(), Some(UrlErrorKind::Syntax));
        assert_eq!(IceError::Closed.url_kind(), None);
    }

    #[test]
    fn test_into_network_error() {
        assert!(NetworkError::from(IceError::Closed).is_closed());
        assert!(NetworkError::from(IceError::Timeout).is_timeout());
        assert!(matches!(
            NetworkError::from(IceError::NoValidPair),
            NetworkError::Protocol(_)
        ));
    }
}
