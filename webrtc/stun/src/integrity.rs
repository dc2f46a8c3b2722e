//! MESSAGE-INTEGRITY and FINGERPRINT (RFC 5389 Sections 15.4 and 15.5).
//!
//! Both are computed over the message up to the attribute itself, with the
//! header length already counting that attribute.

use crc::{CRC_32_ISO_HDLC, Crc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::attribute_type::AttributeType;
use crate::errors::StunError;
use crate::message::Message;

type HmacSha1 = Hmac<Sha1>;

const CRC_32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const FINGERPRINT_XOR: u32 = 0x5354_554e;

/// Attribute header plus HMAC-SHA1 digest.
const INTEGRITY_ATTR_SIZE: usize = 24;
/// Attribute header plus CRC-32.
const FINGERPRINT_ATTR_SIZE: usize = 8;

impl Message {
    fn integrity_mac(&self, prefix_len: usize, key: &[u8]) -> Result<HmacSha1, StunError> {
        let mut header = self.header.clone();
        header.set_message_length((prefix_len + INTEGRITY_ATTR_SIZE) as u16);

        let mut mac = HmacSha1::new_from_slice(key).map_err(|_| StunError::InvalidKey)?;
        mac.update(&header.encode());
        mac.update(&self.attributes[..prefix_len]);
        Ok(mac)
    }

    fn fingerprint_over(&self, prefix_len: usize) -> u32 {
        let mut header = self.header.clone();
        header.set_message_length((prefix_len + FINGERPRINT_ATTR_SIZE) as u16);

        let mut digest = CRC_32.digest();
        digest.update(&header.encode());
        digest.update(&self.attributes[..prefix_len]);
        digest.finalize() ^ FINGERPRINT_XOR
    }

    /// Appends MESSAGE-INTEGRITY keyed by `key` (the ICE password).
    pub fn add_message_integrity(&mut self, key: &[u8]) -> Result<(), StunError> {
        let digest = self
            .integrity_mac(self.attributes.len(), key)?
            .finalize()
            .into_bytes();
        self.add_attribute(AttributeType::MessageIntegrity, &digest);
        Ok(())
    }

    /// Verifies MESSAGE-INTEGRITY against `key`.
    pub fn verify_message_integrity(&self, key: &[u8]) -> Result<(), StunError> {
        let attr = self
            .get(AttributeType::MessageIntegrity)
            .ok_or(StunError::MissingAttribute("MESSAGE-INTEGRITY"))?;
        if attr.value.len() != 20 {
            return Err(StunError::InvalidAttributeFormat);
        }

        self.integrity_mac(attr.offset, key)?
            .verify_slice(attr.value)
            .map_err(|_| StunError::IntegrityMismatch)
    }

    /// Appends FINGERPRINT; must be the last attribute added.
    pub fn add_fingerprint(&mut self) {
        let crc = self.fingerprint_over(self.attributes.len());
        self.add_attribute(AttributeType::Fingerprint, &crc.to_be_bytes());
    }

    /// Verifies FINGERPRINT, which must be the last attribute.
    pub fn verify_fingerprint(&self) -> Result<(), StunError> {
        let attr = self
            .get(AttributeType::Fingerprint)
            .ok_or(StunError::MissingAttribute("FINGERPRINT"))?;
        let value: [u8; 4] = attr
            .value
            .try_into()
            .map_err(|_| StunError::InvalidAttributeFormat)?;
        if attr.offset + FINGERPRINT_ATTR_SIZE != self.attributes.len() {
            return Err(StunError::InvalidAttributeFormat);
        }

        if u32::from_be_bytes(value) != self.fingerprint_over(attr.offset) {
            return Err(StunError::FingerprintMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_type::MessageType;

    // RFC 5769 2.1 sample request
    const SAMPLE_REQUEST: [u8; 108] = [
        0x00, 0x01, 0x00, 0x58, 0x21, 0x12, 0xa4, 0x42, 0xb7, 0xe7, 0xa7, 0x01, 0xbc, 0x34, 0xd6,
        0x86, 0xfa, 0x87, 0xdf, 0xae, 0x80, 0x22, 0x00, 0x10, 0x53, 0x54, 0x55, 0x4e, 0x20, 0x74,
        0x65, 0x73, 0x74, 0x20, 0x63, 0x6c, 0x69, 0x65, 0x6e, 0x74, 0x00, 0x24, 0x00, 0x04, 0x6e,
        0x00, 0x01, 0xff, 0x80, 0x29, 0x00, 0x08, 0x93, 0x2f, 0xf9, 0xb1, 0x51, 0x26, 0x3b, 0x36,
        0x00, 0x06, 0x00, 0x09, 0x65, 0x76, 0x74, 0x6a, 0x3a, 0x68, 0x36, 0x76, 0x59, 0x20, 0x20,
        0x20, 0x00, 0x08, 0x00, 0x14, 0x9a, 0xea, 0xa7, 0x0c, 0xbf, 0xd8, 0xcb, 0x56, 0x78, 0x1e,
        0xf2, 0xb5, 0xb2, 0xd3, 0xf2, 0x49, 0xc1, 0xb5, 0x71, 0xa2, 0x80, 0x28, 0x00, 0x04, 0xe5,
        0x7a, 0x3b, 0xcf,
    ];

    #[test]
    fn test_rfc5769_sample_request_verifies() {
        let message = Message::decode(&SAMPLE_REQUEST).unwrap();

        assert_eq!(message.username().as_deref(), Some("evtj:h6vY"));
        assert_eq!(message.priority(), Some(0x6e0001ff));
        assert!(message.verify_fingerprint().is_ok());
        assert!(
            message
                .verify_message_integrity(b"VOkJxbRl1RmTxUk/WvJxBt")
                .is_ok()
        );
        assert_eq!(
            message.verify_message_integrity(b"wrong"),
            Err(StunError::IntegrityMismatch)
        );
    }

    #[test]
    fn test_integrity_and_fingerprint_survive_encoding() {
        let mut message = Message::new(MessageType::Response, [7; 12]);
        message.add_attribute(AttributeType::Username, b"a:b");
        message.add_message_integrity(b"secret").unwrap();
        message.add_fingerprint();

        let decoded = Message::decode(&message.encode()).unwrap();
        assert!(decoded.verify_message_integrity(b"secret").is_ok());
        assert!(decoded.verify_fingerprint().is_ok());
    }

    #[test]
    fn test_tampered_message_fails_fingerprint() {
        let mut message = Message::new(MessageType::Request, [3; 12]);
        message.add_attribute(AttributeType::Priority, &[0, 0, 0, 9]);
        message.add_fingerprint();

        let mut bytes = message.encode();
        bytes[27] = 10;
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(
            decoded.verify_fingerprint(),
            Err(StunError::FingerprintMismatch)
        );
    }

    #[test]
    fn test_missing_attributes() {
        let message = Message::new(MessageType::Request, [0; 12]);
        assert_eq!(
            message.verify_fingerprint(),
            Err(StunError::MissingAttribute("FINGERPRINT"))
        );
        assert!(message.verify_message_integrity(b"k").is_err());
    }
}
