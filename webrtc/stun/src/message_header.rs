//! STUN message header
//!
//! # Header Format (RFC 5389 Section 6)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 0|     STUN Message Type     |         Message Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Magic Cookie                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! |                     Transaction ID (96 bits)                  |
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::errors::StunError;
use crate::message_type::MessageType;

/// Magic cookie value defined in RFC 5389.
pub const MAGIC_COOKIE: u32 = 0x2112A442;

/// Cheap probe used by the ICE read loop to split STUN from application data.
///
/// True when the two top bits are zero, the magic cookie is present and the
/// declared length fits in `bytes`.
pub fn is_stun_message(bytes: &[u8]) -> bool {
    if bytes.len() < MessageHeader::SIZE || bytes[0] & 0xC0 != 0 {
        return false;
    }
    let magic = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let length = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
    magic == MAGIC_COOKIE && MessageHeader::SIZE + length <= bytes.len()
}

/// STUN message header according to RFC 5389.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    /// Length of the message body (excluding the header)
    pub message_length: u16,
    pub transaction_id: [u8; 12],
}

impl MessageHeader {
    /// Size of the STUN message header in bytes.
    pub const SIZE: usize = 20;

    pub fn new(message_type: MessageType, transaction_id: [u8; 12]) -> Self {
        Self {
            message_type,
            message_length: 0,
            transaction_id,
        }
    }

    /// Encodes the 20-byte header.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.message_type.to_u16().to_be_bytes());
        bytes[2..4].copy_from_slice(&self.message_length.to_be_bytes());
        bytes[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        bytes[8..20].copy_from_slice(&self.transaction_id);
        bytes
    }

    /// Decodes a header, rejecting non-STUN framing.
    pub fn decode(bytes: &[u8]) -> Result<Self, StunError> {
        if bytes.len() < Self::SIZE {
            return Err(StunError::MessageTooShort);
        }

        if bytes[0] & 0xC0 != 0 {
            return Err(StunError::InvalidMessageFormat);
        }

        let msg_type_value = u16::from_be_bytes([bytes[0], bytes[1]]);
        let message_type = MessageType::from_u16(msg_type_value)?;

        let message_length = u16::from_be_bytes([bytes[2], bytes[3]]);
        if message_length % 4 != 0 {
            return Err(StunError::InvalidMessageFormat);
        }

        let magic = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if magic != MAGIC_COOKIE {
            return Err(StunError::InvalidMagicCookie);
        }

        let mut transaction_id = [0u8; 12];
        transaction_id.copy_from_slice(&bytes[8..20]);

        Ok(Self {
            message_type,
            message_length,
            transaction_id,
        })
    }

    pub fn set_message_length(&mut self, length: u16) {
        self.message_length = length;
    }
}
