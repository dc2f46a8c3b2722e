//! STUN attribute types
//!
//! Attributes are Type-Length-Value records following the 20-byte header.
//! Types below 0x8000 are comprehension-required.

/// STUN attribute types used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// MAPPED-ADDRESS (0x0001)
    MappedAddress,
    /// USERNAME (0x0006)
    Username,
    /// MESSAGE-INTEGRITY (0x0008), HMAC-SHA1
    MessageIntegrity,
    /// ERROR-CODE (0x0009)
    ErrorCode,
    /// XOR-MAPPED-ADDRESS (0x0020)
    XorMappedAddress,
    /// PRIORITY (0x0024)
    Priority,
    /// USE-CANDIDATE (0x0025)
    UseCandidate,
    /// SOFTWARE (0x8022)
    Software,
    /// FINGERPRINT (0x8028), CRC-32 xor 0x5354554e
    Fingerprint,
    /// ICE-CONTROLLED (0x8029)
    IceControlled,
    /// ICE-CONTROLLING (0x802A)
    IceControlling,
    /// Anything else, kept by value
    Other(u16),
}

impl AttributeType {
    /// Converts the attribute type to its wire value.
    pub fn to_u16(self) -> u16 {
        match self {
            AttributeType::MappedAddress => 0x0001,
            AttributeType::Username => 0x0006,
            AttributeType::MessageIntegrity => 0x0008,
            AttributeType::ErrorCode => 0x0009,
            AttributeType::XorMappedAddress => 0x0020,
            AttributeType::Priority => 0x0024,
            AttributeType::UseCandidate => 0x0025,
            AttributeType::Software => 0x8022,
            AttributeType::Fingerprint => 0x8028,
            AttributeType::IceControlled => 0x8029,
            AttributeType::IceControlling => 0x802A,
            AttributeType::Other(v) => v,
        }
    }

    /// Maps a wire value to a known attribute, or `Other`.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0001 => AttributeType::MappedAddress,
            0x0006 => AttributeType::Username,
            0x0008 => AttributeType::MessageIntegrity,
            0x0009 => AttributeType::ErrorCode,
            0x0020 => AttributeType::XorMappedAddress,
            0x0024 => AttributeType::Priority,
            0x0025 => AttributeType::UseCandidate,
            0x8022 => AttributeType::Software,
            0x8028 => AttributeType::Fingerprint,
            0x8029 => AttributeType::IceControlled,
            0x802A => AttributeType::IceControlling,
            other => AttributeType::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_type_round_trip() {
        assert_eq!(AttributeType::XorMappedAddress.to_u16(), 0x0020);
        assert_eq!(AttributeType::from_u16(0x802A), AttributeType::IceControlling);
        assert_eq!(AttributeType::from_u16(0x0025), AttributeType::UseCandidate);
        assert_eq!(AttributeType::from_u16(0x1234), AttributeType::Other(0x1234));
        assert_eq!(AttributeType::Other(0x1234).to_u16(), 0x1234);
    }
}
