//! STUN error types

/// Errors that can occur during STUN operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StunError {
    /// Not STUN framing (top bits, length alignment)
    InvalidMessageFormat,
    /// Invalid message type
    InvalidMessageType(u16),
    /// Invalid magic cookie
    InvalidMagicCookie,
    /// Attribute overruns the message or has the wrong size
    InvalidAttributeFormat,
    /// Message too short
    MessageTooShort,
    /// Missing required builder field
    MissingRequiredField(&'static str),
    /// Attribute expected but absent
    MissingAttribute(&'static str),
    /// HMAC key rejected
    InvalidKey,
    /// MESSAGE-INTEGRITY does not verify
    IntegrityMismatch,
    /// FINGERPRINT does not verify
    FingerprintMismatch,
    /// Socket operation error
    SocketError(String),
    /// Timeout waiting for response
    Timeout,
    /// Unexpected message type
    UnexpectedMessageType,
}

impl std::fmt::Display for StunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StunError::InvalidMessageFormat => write!(f, "Invalid message format"),
            StunError::InvalidMessageType(t) => write!(f, "Invalid message type: 0x{:04X}", t),
            StunError::InvalidMagicCookie => write!(f, "Invalid magic cookie"),
            StunError::InvalidAttributeFormat => write!(f, "Invalid attribute format"),
            StunError::MessageTooShort => write!(f, "Message too short"),
            StunError::MissingRequiredField(field) => {
                write!(f, "Missing required field: {}", field)
            }
            StunError::MissingAttribute(attr) => write!(f, "Missing attribute: {}", attr),
            StunError::InvalidKey => write!(f, "Invalid integrity key"),
            StunError::IntegrityMismatch => write!(f, "MESSAGE-INTEGRITY mismatch"),
            StunError::FingerprintMismatch => write!(f, "FINGERPRINT mismatch"),
            StunError::SocketError(e) => write!(f, "Socket error: {}", e),
            StunError::Timeout => write!(f, "Timeout waiting for response"),
            StunError::UnexpectedMessageType => write!(f, "Unexpected message type"),
        }
    }
}

impl std::error::Error for StunError {}

impl From<std::io::Error> for StunError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => StunError::Timeout,
            _ => StunError::SocketError(err.to_string()),
        }
    }
}
