//! STUN message types
//!
//! Only the Binding method is used by ICE; the class bits select request,
//! indication, success response or error response.

use crate::errors::StunError;

/// Binding message types according to RFC 5389.
///
/// # Message Classes
/// - Request: 0x000
/// - Indication: 0x010
/// - Success Response: 0x100
/// - Error Response: 0x110
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Binding Request (0x0001)
    Request,
    /// Binding Indication (0x0011), used for keepalives
    Indication,
    /// Binding Success Response (0x0101)
    Response,
    /// Binding Error Response (0x0111)
    ErrorResponse,
}

impl MessageType {
    /// Converts the message type to its RFC 5389 value.
    pub fn to_u16(self) -> u16 {
        match self {
            MessageType::Request => 0x0001,
            MessageType::Indication => 0x0011,
            MessageType::Response => 0x0101,
            MessageType::ErrorResponse => 0x0111,
        }
    }

    /// Parses a message type from its RFC 5389 value.
    pub fn from_u16(value: u16) -> Result<Self, StunError> {
        match value {
            0x0001 => Ok(MessageType::Request),
            0x0011 => Ok(MessageType::Indication),
            0x0101 => Ok(MessageType::Response),
            0x0111 => Ok(MessageType::ErrorResponse),
            _ => Err(StunError::InvalidMessageType(value)),
        }
    }

    pub fn is_request(self) -> bool {
        self == MessageType::Request
    }

    pub fn is_success_response(self) -> bool {
        self == MessageType::Response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_values() {
        for t in [
            MessageType::Request,
            MessageType::Indication,
            MessageType::Response,
            MessageType::ErrorResponse,
        ] {
            assert_eq!(MessageType::from_u16(t.to_u16()).unwrap(), t);
        }
        assert_eq!(MessageType::Indication.to_u16(), 0x0011);
    }

    #[test]
    fn test_message_type_rejects_other_methods() {
        // Allocate request (TURN)
        assert_eq!(
            MessageType::from_u16(0x0003),
            Err(StunError::InvalidMessageType(0x0003))
        );
    }
}
