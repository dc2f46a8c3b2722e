//! STUN message builder
//!
//! Fluent construction of Binding messages. MESSAGE-INTEGRITY and FINGERPRINT
//! are always appended last, in that order, whatever order the builder
//! methods were called in.

use std::net::SocketAddr;

use crate::attribute_type::AttributeType;
use crate::errors::StunError;
use crate::message::Message;
use crate::message_type::MessageType;
use crate::xor_mapped_address;

/// Builder for constructing STUN messages.
///
/// ```
/// use stun::{MessageBuilder, MessageType};
///
/// let ping = MessageBuilder::new(MessageType::Request)
///     .random_transaction_id()
///     .username("remoteUfrag:localUfrag")
///     .priority(2_130_706_431)
///     .ice_controlling(7)
///     .use_candidate()
///     .message_integrity(b"remote-password")
///     .fingerprint()
///     .build()
///     .unwrap();
/// assert!(ping.verify_fingerprint().is_ok());
/// ```
pub struct MessageBuilder {
    message_type: MessageType,
    transaction_id: Option<[u8; 12]>,
    attributes: Vec<(AttributeType, Vec<u8>)>,
    xor_mapped: Option<SocketAddr>,
    integrity_key: Option<Vec<u8>>,
    fingerprint: bool,
}

impl MessageBuilder {
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            transaction_id: None,
            attributes: Vec::new(),
            xor_mapped: None,
            integrity_key: None,
            fingerprint: false,
        }
    }

    /// Draws a transaction id from the thread-local CSPRNG.
    pub fn random_transaction_id(mut self) -> Self {
        self.transaction_id = Some(rand::random());
        self
    }

    /// Reuses a known transaction id, e.g. when answering a request.
    pub fn transaction_id(mut self, id: [u8; 12]) -> Self {
        self.transaction_id = Some(id);
        self
    }

    pub fn attribute(mut self, attr_type: AttributeType, value: &[u8]) -> Self {
        self.attributes.push((attr_type, value.to_vec()));
        self
    }

    pub fn username(self, username: &str) -> Self {
        self.attribute(AttributeType::Username, username.as_bytes())
    }

    pub fn priority(self, priority: u32) -> Self {
        self.attribute(AttributeType::Priority, &priority.to_be_bytes())
    }

    pub fn use_candidate(self) -> Self {
        self.attribute(AttributeType::UseCandidate, &[])
    }

    pub fn ice_controlling(self, tie_breaker: u64) -> Self {
        self.attribute(AttributeType::IceControlling, &tie_breaker.to_be_bytes())
    }

    pub fn ice_controlled(self, tie_breaker: u64) -> Self {
        self.attribute(AttributeType::IceControlled, &tie_breaker.to_be_bytes())
    }

    /// XOR-MAPPED-ADDRESS depends on the transaction id, so it is encoded at build time.
    pub fn xor_mapped_address(mut self, addr: SocketAddr) -> Self {
        self.xor_mapped = Some(addr);
        self
    }

    pub fn message_integrity(mut self, key: &[u8]) -> Self {
        self.integrity_key = Some(key.to_vec());
        self
    }

    pub fn fingerprint(mut self) -> Self {
        self.fingerprint = true;
        self
    }

    /// Builds the STUN message.
    ///
    /// # Errors
    /// `MissingRequiredField` without a transaction id.
    pub fn build(self) -> Result<Message, StunError> {
        let transaction_id = self
            .transaction_id
            .ok_or(StunError::MissingRequiredField("transaction_id"))?;

        let mut message = Message::new(self.message_type, transaction_id);

        for (attr_type, value) in self.attributes {
            message.add_attribute(attr_type, &value);
        }
        if let Some(addr) = self.xor_mapped {
            message.add_attribute(
                AttributeType::XorMappedAddress,
                &xor_mapped_address::encode(&addr, &transaction_id),
            );
        }
        if let Some(key) = self.integrity_key {
            message.add_message_integrity(&key)?;
        }
        if self.fingerprint {
            message.add_fingerprint();
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder_missing_transaction_id() {
        let result = MessageBuilder::new(MessageType::Request).build();

        assert!(matches!(
            result,
            Err(StunError::MissingRequiredField("transaction_id"))
        ));
    }

    #[test]
    fn test_random_transaction_ids_differ() {
        let a = MessageBuilder::new(MessageType::Request)
            .random_transaction_id()
            .build()
            .unwrap();
        let b = MessageBuilder::new(MessageType::Request)
            .random_transaction_id()
            .build()
            .unwrap();
        assert_ne!(a.transaction_id(), b.transaction_id());
    }

    #[test]
    fn test_integrity_and_fingerprint_come_last() {
        let peer: SocketAddr = "10.0.0.2:40000".parse().unwrap();
        let message = MessageBuilder::new(MessageType::Response)
            .transaction_id([9; 12])
            .fingerprint()
            .message_integrity(b"pwd")
            .xor_mapped_address(peer)
            .build()
            .unwrap();

        let order: Vec<AttributeType> = message.attributes().map(|a| a.attr_type).collect();
        assert_eq!(
            order,
            vec![
                AttributeType::XorMappedAddress,
                AttributeType::MessageIntegrity,
                AttributeType::Fingerprint
            ]
        );
        assert_eq!(message.xor_mapped_address(), Some(peer));
        assert!(message.verify_message_integrity(b"pwd").is_ok());
    }
}
