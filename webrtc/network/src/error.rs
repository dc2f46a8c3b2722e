//! Network error types
//!
//! This module defines the error types shared by the packet endpoints, the
//! mux and the SCTP association. All errors are wrapped in `NetworkError`
//! for consistent error handling.

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, NetworkError>;

/// Network-related errors
#[derive(Debug)]
pub enum NetworkError {
    /// Endpoint, buffer or transport was closed locally.
    Closed,
    /// Underlying transport reached end of stream.
    Eof,
    /// A read or write deadline expired.
    Timeout,
    /// Receive buffer smaller than the datagram; the datagram was consumed.
    ShortBuffer { needed: usize, available: usize },
    /// Packet buffer is over its byte limit.
    BufferFull,
    Io(io::Error),
    InvalidPacket(String),
    ChecksumMismatch { ours: u32, theirs: u32 },
    Protocol(String),
    StreamExists(u16),
    StreamClosed,
    AssociationClosed,
    MessageTooLarge(usize),
    HandshakeFailed(String),
    Config(String),
}

impl NetworkError {
    /// True for deadline expiry, the only error a caller should simply retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout)
    }

    /// True when the endpoint will never yield data again.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            NetworkError::Closed
                | NetworkError::Eof
                | NetworkError::StreamClosed
                | NetworkError::AssociationClosed
        )
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Closed => write!(f, "use of closed network connection"),
            NetworkError::Eof => write!(f, "end of stream"),
            NetworkError::Timeout => write!(f, "i/o timeout"),
            NetworkError::ShortBuffer { needed, available } => write!(
                f,
                "short buffer: packet of {} bytes, buffer of {}",
                needed, available
            ),
            NetworkError::BufferFull => write!(f, "packet buffer full"),
            NetworkError::Io(err) => write!(f, "I/O error: {}", err),
            NetworkError::InvalidPacket(msg) => write!(f, "Invalid packet: {}", msg),
            NetworkError::ChecksumMismatch { ours, theirs } => write!(
                f,
                "checksum mismatch: computed 0x{:08x}, packet carries 0x{:08x}",
                ours, theirs
            ),
            NetworkError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            NetworkError::StreamExists(id) => write!(f, "stream {} already exists", id),
            NetworkError::StreamClosed => write!(f, "stream closed"),
            NetworkError::AssociationClosed => write!(f, "association closed"),
            NetworkError::MessageTooLarge(len) => write!(
                f,
                "outbound message of {} bytes exceeds maximum of {}",
                len,
                u16::MAX
            ),
            NetworkError::HandshakeFailed(msg) => write!(f, "Handshake failed: {}", msg),
            NetworkError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NetworkError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => NetworkError::Timeout,
            io::ErrorKind::UnexpectedEof => NetworkError::Eof,
            _ => NetworkError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = NetworkError::Config("buffer size must be positive".to_string());
        assert_eq!(err.to_string(), "Config error: buffer size must be positive");
    }

    #[test]
    fn test_error_display_short_buffer() {
        let err = NetworkError::ShortBuffer {
            needed: 1200,
            available: 10,
        };
        assert_eq!(
            err.to_string(),
            "short buffer: packet of 1200 bytes, buffer of 10"
        );
    }

    #[test]
    fn test_timeout_probe() {
        assert!(NetworkError::Timeout.is_timeout());
        assert!(!NetworkError::Closed.is_timeout());
        let from_io: NetworkError = io::Error::new(io::ErrorKind::WouldBlock, "again").into();
        assert!(from_io.is_timeout());
    }

    #[test]
    fn test_closed_probe() {
        assert!(NetworkError::Closed.is_closed());
        assert!(NetworkError::AssociationClosed.is_closed());
        assert!(!NetworkError::BufferFull.is_closed());
    }

    #[test]
    fn test_error_is_error_trait() {
        let err = NetworkError::Io(io::Error::other("boom"));
        let as_dyn: &dyn std::error::Error = &err;
        assert!(as_dyn.source().is_some());
    }
}
