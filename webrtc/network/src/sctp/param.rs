//! Variable-length parameters carried inside INIT, INIT-ACK and HEARTBEAT
//! chunks (RFC 4960 Section 3.2.1).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Parameter Type       |       Parameter Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! /                       Parameter Value                         /
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The length excludes padding. Every parameter but the last in a chunk is
//! padded to a 4-byte boundary.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{NetworkError, Result};

const PARAM_HEADER_SIZE: usize = 4;

/// Parameter type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    HeartbeatInfo,
    Ipv4Address,
    Ipv6Address,
    StateCookie,
    UnrecognizedParameter,
    CookiePreservative,
    HostNameAddress,
    SupportedAddressTypes,
    OutgoingSsnResetRequest,
    IncomingSsnResetRequest,
    SsnTsnResetRequest,
    ReconfigResponse,
    AddOutgoingStreamsRequest,
    AddIncomingStreamsRequest,
    Random,
    ChunkList,
    RequestedHmacAlgorithm,
    Padding,
    SupportedExtensions,
    ForwardTsnSupported,
    AddIpAddress,
    DeleteIpAddress,
    ErrorCauseIndication,
    SetPrimaryAddress,
    SuccessIndication,
    AdaptationLayerIndication,
    Other(u16),
}

impl ParamType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::HeartbeatInfo,
            5 => Self::Ipv4Address,
            6 => Self::Ipv6Address,
            7 => Self::StateCookie,
            8 => Self::UnrecognizedParameter,
            9 => Self::CookiePreservative,
            11 => Self::HostNameAddress,
            12 => Self::SupportedAddressTypes,
            13 => Self::OutgoingSsnResetRequest,
            14 => Self::IncomingSsnResetRequest,
            15 => Self::SsnTsnResetRequest,
            16 => Self::ReconfigResponse,
            17 => Self::AddOutgoingStreamsRequest,
            18 => Self::AddIncomingStreamsRequest,
            0x8002 => Self::Random,
            0x8003 => Self::ChunkList,
            0x8004 => Self::RequestedHmacAlgorithm,
            0x8005 => Self::Padding,
            0x8008 => Self::SupportedExtensions,
            0xC000 => Self::ForwardTsnSupported,
            0xC001 => Self::AddIpAddress,
            0xC002 => Self::DeleteIpAddress,
            0xC003 => Self::ErrorCauseIndication,
            0xC004 => Self::SetPrimaryAddress,
            0xC005 => Self::SuccessIndication,
            0xC006 => Self::AdaptationLayerIndication,
            other => Self::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::HeartbeatInfo => 1,
            Self::Ipv4Address => 5,
            Self::Ipv6Address => 6,
            Self::StateCookie => 7,
            Self::UnrecognizedParameter => 8,
            Self::CookiePreservative => 9,
            Self::HostNameAddress => 11,
            Self::SupportedAddressTypes => 12,
            Self::OutgoingSsnResetRequest => 13,
            Self::IncomingSsnResetRequest => 14,
            Self::SsnTsnResetRequest => 15,
            Self::ReconfigResponse => 16,
            Self::AddOutgoingStreamsRequest => 17,
            Self::AddIncomingStreamsRequest => 18,
            Self::Random => 0x8002,
            Self::ChunkList => 0x8003,
            Self::RequestedHmacAlgorithm => 0x8004,
            Self::Padding => 0x8005,
            Self::SupportedExtensions => 0x8008,
            Self::ForwardTsnSupported => 0xC000,
            Self::AddIpAddress => 0xC001,
            Self::DeleteIpAddress => 0xC002,
            Self::ErrorCauseIndication => 0xC003,
            Self::SetPrimaryAddress => 0xC004,
            Self::SuccessIndication => 0xC005,
            Self::AdaptationLayerIndication => 0xC006,
            Self::Other(value) => value,
        }
    }
}

/// A decoded parameter.
///
/// Parameters whose body this implementation does not interpret are kept as
/// [`Param::Raw`] so they survive a parse and re-serialize unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    HeartbeatInfo(Vec<u8>),
    Ipv4Address(Ipv4Addr),
    Ipv6Address(Ipv6Addr),
    StateCookie(Vec<u8>),
    /// Suggested cookie life-span increment in milliseconds
    CookiePreservative(u32),
    HostNameAddress(String),
    SupportedAddressTypes(Vec<u16>),
    Random(Vec<u8>),
    /// Chunk types that must be authenticated
    ChunkList(Vec<u8>),
    RequestedHmacAlgorithm(Vec<u16>),
    /// Chunk types the sender supports beyond RFC 4960
    SupportedExtensions(Vec<u8>),
    ForwardTsnSupported,
    AdaptationLayerIndication(u32),
    Raw { param_type: ParamType, value: Vec<u8> },
}

impl Param {
    /// A State Cookie of 32 bytes from the thread-local CSPRNG.
    pub fn random_state_cookie() -> Self {
        Param::StateCookie(rand::random::<[u8; 32]>().to_vec())
    }

    pub fn param_type(&self) -> ParamType {
        match self {
            Param::HeartbeatInfo(_) => ParamType::HeartbeatInfo,
            Param::Ipv4Address(_) => ParamType::Ipv4Address,
            Param::Ipv6Address(_) => ParamType::Ipv6Address,
            Param::StateCookie(_) => ParamType::StateCookie,
            Param::CookiePreservative(_) => ParamType::CookiePreservative,
            Param::HostNameAddress(_) => ParamType::HostNameAddress,
            Param::SupportedAddressTypes(_) => ParamType::SupportedAddressTypes,
            Param::Random(_) => ParamType::Random,
            Param::ChunkList(_) => ParamType::ChunkList,
            Param::RequestedHmacAlgorithm(_) => ParamType::RequestedHmacAlgorithm,
            Param::SupportedExtensions(_) => ParamType::SupportedExtensions,
            Param::ForwardTsnSupported => ParamType::ForwardTsnSupported,
            Param::AdaptationLayerIndication(_) => ParamType::AdaptationLayerIndication,
            Param::Raw { param_type, .. } => *param_type,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        match self {
            Param::HeartbeatInfo(v)
            | Param::StateCookie(v)
            | Param::Random(v)
            | Param::ChunkList(v)
            | Param::SupportedExtensions(v)
            | Param::Raw { value: v, .. } => v.clone(),
            Param::Ipv4Address(addr) => addr.octets().to_vec(),
            Param::Ipv6Address(addr) => addr.octets().to_vec(),
            Param::CookiePreservative(v) | Param::AdaptationLayerIndication(v) => {
                v.to_be_bytes().to_vec()
            }
            // NUL terminated per RFC 4960 3.3.2.1
            Param::HostNameAddress(name) => {
                let mut v = name.as_bytes().to_vec();
                v.push(0);
                v
            }
            Param::SupportedAddressTypes(list) | Param::RequestedHmacAlgorithm(list) => {
                list.iter().flat_map(|t| t.to_be_bytes()).collect()
            }
            Param::ForwardTsnSupported => Vec::new(),
        }
    }

    /// Serializes the TLV without trailing padding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let value = self.value_bytes();
        let mut buf = Vec::with_capacity(PARAM_HEADER_SIZE + value.len());
        buf.extend_from_slice(&self.param_type().to_u16().to_be_bytes());
        buf.extend_from_slice(&((PARAM_HEADER_SIZE + value.len()) as u16).to_be_bytes());
        buf.extend_from_slice(&value);
        buf
    }

    /// Decodes one parameter value of the given type.
    pub fn from_value(param_type: ParamType, value: &[u8]) -> Result<Self> {
        let invalid = || {
            NetworkError::InvalidPacket(format!(
                "parameter 0x{:04x} has invalid length {}",
                param_type.to_u16(),
                value.len()
            ))
        };

        Ok(match param_type {
            ParamType::HeartbeatInfo => Param::HeartbeatInfo(value.to_vec()),
            ParamType::StateCookie => Param::StateCookie(value.to_vec()),
            ParamType::Random => Param::Random(value.to_vec()),
            ParamType::ChunkList => Param::ChunkList(value.to_vec()),
            ParamType::SupportedExtensions => Param::SupportedExtensions(value.to_vec()),
            ParamType::ForwardTsnSupported => Param::ForwardTsnSupported,
            ParamType::Ipv4Address => {
                let octets: [u8; 4] = value.try_into().map_err(|_| invalid())?;
                Param::Ipv4Address(Ipv4Addr::from(octets))
            }
            ParamType::Ipv6Address => {
                let octets: [u8; 16] = value.try_into().map_err(|_| invalid())?;
                Param::Ipv6Address(Ipv6Addr::from(octets))
            }
            ParamType::CookiePreservative => {
                let bytes: [u8; 4] = value.try_into().map_err(|_| invalid())?;
                Param::CookiePreservative(u32::from_be_bytes(bytes))
            }
            ParamType::AdaptationLayerIndication => {
                let bytes: [u8; 4] = value.try_into().map_err(|_| invalid())?;
                Param::AdaptationLayerIndication(u32::from_be_bytes(bytes))
            }
            ParamType::HostNameAddress => {
                let name = value.split(|b| *b == 0).next().unwrap_or_default();
                Param::HostNameAddress(String::from_utf8_lossy(name).into_owned())
            }
            ParamType::SupportedAddressTypes | ParamType::RequestedHmacAlgorithm => {
                if value.len() % 2 != 0 {
                    return Err(invalid());
                }
                let list = value
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                if param_type == ParamType::SupportedAddressTypes {
                    Param::SupportedAddressTypes(list)
                } else {
                    Param::RequestedHmacAlgorithm(list)
                }
            }
            other => Param::Raw {
                param_type: other,
                value: value.to_vec(),
            },
        })
    }

    /// Parses the parameter list that follows a chunk's fixed fields.
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>> {
        let mut params = Vec::new();
        let mut offset = 0;

        while offset + PARAM_HEADER_SIZE <= data.len() {
            let param_type = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let length = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            if length < PARAM_HEADER_SIZE || offset + length > data.len() {
                return Err(NetworkError::InvalidPacket(format!(
                    "parameter 0x{:04x} declares length {} with {} bytes left",
                    param_type,
                    length,
                    data.len() - offset
                )));
            }

            params.push(Self::from_value(
                ParamType::from_u16(param_type),
                &data[offset + PARAM_HEADER_SIZE..offset + length],
            )?);
            offset += (length + 3) & !3;
        }

        Ok(params)
    }

    /// Serializes parameters, padding all but the last.
    pub fn serialize_all(params: &[Self]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (i, param) in params.iter().enumerate() {
            buf.extend_from_slice(&param.to_bytes());
            if i + 1 < params.len() {
                let padding = (4 - (buf.len() % 4)) % 4;
                buf.extend(std::iter::repeat_n(0u8, padding));
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        for value in [1u16, 5, 6, 7, 8, 9, 11, 12, 13, 18, 0x8002, 0x8005, 0x8008, 0xC006] {
            assert_eq!(ParamType::from_u16(value).to_u16(), value);
        }
        assert_eq!(ParamType::from_u16(0x1234), ParamType::Other(0x1234));
    }

    #[test]
    fn test_state_cookie_is_random() {
        let (Param::StateCookie(a), Param::StateCookie(b)) =
            (Param::random_state_cookie(), Param::random_state_cookie())
        else {
            panic!("expected state cookies");
        };
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_last_param_may_omit_padding() {
        // Supported Extensions (9 bytes, padded) followed by Chunk List (6 bytes, unpadded)
        let data = [
            0x80, 0x08, 0x00, 0x09, 0xc0, 0x0f, 0xc1, 0x80, 0x82, 0x00, 0x00, 0x00, 0x80, 0x03,
            0x00, 0x06, 0x80, 0xc1,
        ];
        let params = Param::parse_all(&data).unwrap();
        assert_eq!(
            params,
            vec![
                Param::SupportedExtensions(vec![0xc0, 0x0f, 0xc1, 0x80, 0x82]),
                Param::ChunkList(vec![0x80, 0xc1]),
            ]
        );
        assert_eq!(Param::serialize_all(&params), data.to_vec());
    }

    #[test]
    fn test_unknown_param_kept_raw() {
        let data = [0x12, 0x34, 0x00, 0x06, 0xAA, 0xBB];
        let params = Param::parse_all(&data).unwrap();
        assert_eq!(
            params[0],
            Param::Raw {
                param_type: ParamType::Other(0x1234),
                value: vec![0xAA, 0xBB]
            }
        );
        assert_eq!(params[0].to_bytes(), data.to_vec());
    }

    #[test]
    fn test_address_params() {
        let v4 = Param::Ipv4Address(Ipv4Addr::new(192, 0, 2, 1));
        let bytes = v4.to_bytes();
        assert_eq!(bytes, vec![0, 5, 0, 8, 192, 0, 2, 1]);
        assert_eq!(Param::parse_all(&bytes).unwrap(), vec![v4]);

        assert!(Param::from_value(ParamType::Ipv6Address, &[0; 4]).is_err());
    }

    #[test]
    fn test_overlong_length_rejected() {
        assert!(Param::parse_all(&[0x00, 0x07, 0x00, 0x20, 1, 2]).is_err());
    }
}
