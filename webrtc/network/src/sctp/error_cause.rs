//! Error causes carried by ABORT and ERROR chunks (RFC 4960 Section 3.3.10)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Cause Code          |       Cause Length            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! /                    Cause-Specific Information                 /
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::fmt;

use crate::error::{NetworkError, Result};

const CAUSE_HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCauseCode {
    InvalidStreamIdentifier,
    MissingMandatoryParameter,
    StaleCookieError,
    OutOfResource,
    UnresolvableAddress,
    UnrecognizedChunkType,
    InvalidMandatoryParameter,
    UnrecognizedParameters,
    NoUserData,
    CookieReceivedWhileShuttingDown,
    RestartWithNewAddresses,
    UserInitiatedAbort,
    ProtocolViolation,
    Other(u16),
}

impl ErrorCauseCode {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::InvalidStreamIdentifier,
            2 => Self::MissingMandatoryParameter,
            3 => Self::StaleCookieError,
            4 => Self::OutOfResource,
            5 => Self::UnresolvableAddress,
            6 => Self::UnrecognizedChunkType,
            7 => Self::InvalidMandatoryParameter,
            8 => Self::UnrecognizedParameters,
            9 => Self::NoUserData,
            10 => Self::CookieReceivedWhileShuttingDown,
            11 => Self::RestartWithNewAddresses,
            12 => Self::UserInitiatedAbort,
            13 => Self::ProtocolViolation,
            other => Self::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::InvalidStreamIdentifier => 1,
            Self::MissingMandatoryParameter => 2,
            Self::StaleCookieError => 3,
            Self::OutOfResource => 4,
            Self::UnresolvableAddress => 5,
            Self::UnrecognizedChunkType => 6,
            Self::InvalidMandatoryParameter => 7,
            Self::UnrecognizedParameters => 8,
            Self::NoUserData => 9,
            Self::CookieReceivedWhileShuttingDown => 10,
            Self::RestartWithNewAddresses => 11,
            Self::UserInitiatedAbort => 12,
            Self::ProtocolViolation => 13,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCauseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidStreamIdentifier => "Invalid Stream Identifier",
            Self::MissingMandatoryParameter => "Missing Mandatory Parameter",
            Self::StaleCookieError => "Stale Cookie Error",
            Self::OutOfResource => "Out Of Resource",
            Self::UnresolvableAddress => "Unresolvable IP",
            Self::UnrecognizedChunkType => "Unrecognized Chunk Type",
            Self::InvalidMandatoryParameter => "Invalid Mandatory Parameter",
            Self::UnrecognizedParameters => "Unrecognized Parameters",
            Self::NoUserData => "No User Data",
            Self::CookieReceivedWhileShuttingDown => "Cookie Received While Shutting Down",
            Self::RestartWithNewAddresses => "Restart Of An Association With New Addresses",
            Self::UserInitiatedAbort => "User Initiated Abort",
            Self::ProtocolViolation => "Protocol Violation",
            Self::Other(code) => return write!(f, "Unknown cause code {}", code),
        };
        f.write_str(name)
    }
}

/// One error cause TLV. The cause-specific information is kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCause {
    pub code: ErrorCauseCode,
    pub info: Vec<u8>,
}

impl ErrorCause {
    pub fn new(code: ErrorCauseCode, info: Vec<u8>) -> Self {
        Self { code, info }
    }

    /// Protocol Violation with a human-readable reason.
    pub fn protocol_violation(reason: &str) -> Self {
        Self::new(ErrorCauseCode::ProtocolViolation, reason.as_bytes().to_vec())
    }

    /// User-Initiated Abort with an upper-layer reason.
    pub fn user_initiated_abort(reason: &str) -> Self {
        Self::new(ErrorCauseCode::UserInitiatedAbort, reason.as_bytes().to_vec())
    }

    /// Missing Mandatory Parameter listing the missing parameter types.
    pub fn missing_mandatory_parameter(param_types: &[u16]) -> Self {
        let mut info = Vec::with_capacity(4 + 2 * param_types.len());
        info.extend_from_slice(&(param_types.len() as u32).to_be_bytes());
        for param_type in param_types {
            info.extend_from_slice(&param_type.to_be_bytes());
        }
        Self::new(ErrorCauseCode::MissingMandatoryParameter, info)
    }

    /// Encoded length without trailing padding.
    fn encoded_len(&self) -> usize {
        CAUSE_HEADER_SIZE + self.info.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.code.to_u16().to_be_bytes());
        buf.extend_from_slice(&(self.encoded_len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.info);
        buf
    }

    /// Parses every cause in `data`. Causes are padded to 4 bytes except, possibly, the last.
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>> {
        let mut causes = Vec::new();
        let mut offset = 0;

        while offset + CAUSE_HEADER_SIZE <= data.len() {
            let code = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let length = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            if length < CAUSE_HEADER_SIZE || offset + length > data.len() {
                return Err(NetworkError::InvalidPacket(format!(
                    "error cause {} has invalid length {}",
                    code, length
                )));
            }

            causes.push(Self::new(
                ErrorCauseCode::from_u16(code),
                data[offset + CAUSE_HEADER_SIZE..offset + length].to_vec(),
            ));
            offset += (length + 3) & !3;
        }

        Ok(causes)
    }

    /// Serializes causes back to back, padding all but the last.
    pub fn serialize_all(causes: &[Self]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (i, cause) in causes.iter().enumerate() {
            buf.extend_from_slice(&cause.to_bytes());
            if i + 1 < causes.len() {
                let padding = (4 - (buf.len() % 4)) % 4;
                buf.extend(std::iter::repeat_n(0u8, padding));
            }
        }
        buf
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            ErrorCauseCode::ProtocolViolation | ErrorCauseCode::UserInitiatedAbort
                if !self.info.is_empty() =>
            {
                write!(f, "{}: {}", self.code, String::from_utf8_lossy(&self.info))
            }
            _ => write!(f, "{}", self.code),
        }
    }
}
