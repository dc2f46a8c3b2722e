//! STUN message structure
//!
//! A STUN message is a 20-byte header followed by zero or more attributes.
//! Attributes are stored encoded; typed getters decode on demand.

use std::net::SocketAddr;

use crate::attribute_type::AttributeType;
use crate::errors::StunError;
use crate::message_header::MessageHeader;
use crate::message_type::MessageType;
use crate::xor_mapped_address;

/// A complete STUN message according to RFC 5389.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    /// Encoded attributes (type-length-value format, padded)
    pub attributes: Vec<u8>,
}

/// One attribute as found in the encoded attribute area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    pub attr_type: AttributeType,
    pub value: &'a [u8],
    /// Offset of the attribute header within the attribute area.
    pub offset: usize,
}

impl Message {
    pub fn new(message_type: MessageType, transaction_id: [u8; 12]) -> Self {
        Self {
            header: MessageHeader::new(message_type, transaction_id),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute, padding the value to a 4-byte boundary.
    pub fn add_attribute(&mut self, attr_type: AttributeType, value: &[u8]) {
        let padding = (4 - (value.len() % 4)) % 4;
        self.attributes.reserve(4 + value.len() + padding);

        self.attributes
            .extend_from_slice(&attr_type.to_u16().to_be_bytes());
        self.attributes
            .extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.attributes.extend_from_slice(value);
        self.attributes.resize(self.attributes.len() + padding, 0);

        self.header.set_message_length(self.attributes.len() as u16);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MessageHeader::SIZE + self.attributes.len());
        bytes.extend_from_slice(&self.header.encode());
        bytes.extend_from_slice(&self.attributes);
        bytes
    }

    /// Decodes a message; trailing bytes past the declared length are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, StunError> {
        let header = MessageHeader::decode(bytes)?;

        let total_len = MessageHeader::SIZE + header.message_length as usize;
        if bytes.len() < total_len {
            return Err(StunError::MessageTooShort);
        }

        let message = Self {
            header,
            attributes: bytes[MessageHeader::SIZE..total_len].to_vec(),
        };

        // every attribute must fit inside the declared length
        let walked: usize = message
            .attributes()
            .map(|a| 4 + a.value.len() + (4 - a.value.len() % 4) % 4)
            .sum();
        if walked != message.attributes.len() {
            return Err(StunError::InvalidAttributeFormat);
        }

        Ok(message)
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn transaction_id(&self) -> [u8; 12] {
        self.header.transaction_id
    }

    pub fn attributes_bytes(&self) -> &[u8] {
        &self.attributes
    }

    /// Iterates attributes in wire order; stops at the first malformed one.
    pub fn attributes(&self) -> impl Iterator<Item = RawAttribute<'_>> {
        let attrs = &self.attributes;
        let mut offset = 0;
        std::iter::from_fn(move || {
            if offset + 4 > attrs.len() {
                return None;
            }
            let attr_type = u16::from_be_bytes([attrs[offset], attrs[offset + 1]]);
            let length = u16::from_be_bytes([attrs[offset + 2], attrs[offset + 3]]) as usize;
            let start = offset + 4;
            if start + length > attrs.len() {
                return None;
            }
            let attr = RawAttribute {
                attr_type: AttributeType::from_u16(attr_type),
                value: &attrs[start..start + length],
                offset,
            };
            offset = start + length + (4 - length % 4) % 4;
            Some(attr)
        })
    }

    /// First attribute of the given type.
    pub fn get(&self, attr_type: AttributeType) -> Option<RawAttribute<'_>> {
        self.attributes().find(|a| a.attr_type == attr_type)
    }

    pub fn contains(&self, attr_type: AttributeType) -> bool {
        self.get(attr_type).is_some()
    }

    pub fn username(&self) -> Option<String> {
        self.get(AttributeType::Username)
            .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
    }

    pub fn priority(&self) -> Option<u32> {
        self.get(AttributeType::Priority)
            .and_then(|a| a.value.try_into().ok())
            .map(u32::from_be_bytes)
    }

    pub fn ice_controlling(&self) -> Option<u64> {
        self.get(AttributeType::IceControlling)
            .and_then(|a| a.value.try_into().ok())
            .map(u64::from_be_bytes)
    }

    pub fn ice_controlled(&self) -> Option<u64> {
        self.get(AttributeType::IceControlled)
            .and_then(|a| a.value.try_into().ok())
            .map(u64::from_be_bytes)
    }

    pub fn use_candidate(&self) -> bool {
        self.contains(AttributeType::UseCandidate)
    }

    pub fn xor_mapped_address(&self) -> Option<SocketAddr> {
        self.get(AttributeType::XorMappedAddress)
            .and_then(|a| xor_mapped_address::decode(a.value, &self.header.transaction_id))
    }
}
