//! DATA chunk
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Type = 0    | Reserved|I|U|B|E|        Length               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                              TSN                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Stream Identifier        |   Stream Sequence Number      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload Protocol Identifier                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! \                                                               \
//! /                           User Data                           /
//! \                                                               \
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::time::Instant;

use super::{ChunkType, write_header};
use crate::error::{NetworkError, Result};

/// DATA header (chunk header plus fixed fields)
pub const DATA_HEADER_SIZE: usize = 16;

const FLAG_ENDING: u8 = 0x01;
const FLAG_BEGINNING: u8 = 0x02;
const FLAG_UNORDERED: u8 = 0x04;
const FLAG_IMMEDIATE_SACK: u8 = 0x08;

/// Payload Protocol Identifiers for WebRTC
pub mod ppid {
    /// WebRTC DCEP (Data Channel Establishment Protocol)
    pub const DCEP: u32 = 50;
    /// WebRTC String (UTF-8)
    pub const STRING: u32 = 51;
    /// WebRTC Binary
    pub const BINARY: u32 = 53;
    /// WebRTC String Empty
    pub const STRING_EMPTY: u32 = 56;
    /// WebRTC Binary Empty
    pub const BINARY_EMPTY: u32 = 57;
}

/// DATA chunk for transmitting user data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    /// Unordered flag - if true, can be delivered out of order
    pub unordered: bool,
    /// Beginning fragment flag
    pub beginning: bool,
    /// Ending fragment flag
    pub ending: bool,
    /// Receiver should SACK without delay (RFC 7053)
    pub immediate_sack: bool,
    /// Transmission Sequence Number
    pub tsn: u32,
    /// Stream identifier
    pub stream_id: u16,
    /// Stream sequence number
    pub stream_seq: u16,
    /// Payload protocol identifier (PPID)
    pub ppid: u32,
    /// User data
    pub data: Vec<u8>,

    // transmission bookkeeping, never on the wire
    pub sent_at: Option<Instant>,
    pub transmit_count: u32,
}

impl DataChunk {
    /// Create a new unfragmented, ordered DATA chunk
    pub fn new(tsn: u32, stream_id: u16, stream_seq: u16, ppid: u32, data: Vec<u8>) -> Self {
        Self {
            unordered: false,
            beginning: true,
            ending: true,
            immediate_sack: false,
            tsn,
            stream_id,
            stream_seq,
            ppid,
            data,
            sent_at: None,
            transmit_count: 0,
        }
    }

    pub fn flags(&self) -> u8 {
        (if self.immediate_sack { FLAG_IMMEDIATE_SACK } else { 0 })
            | (if self.unordered { FLAG_UNORDERED } else { 0 })
            | (if self.beginning { FLAG_BEGINNING } else { 0 })
            | (if self.ending { FLAG_ENDING } else { 0 })
    }

    /// Serialize to bytes, without trailing padding
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DATA_HEADER_SIZE + self.data.len());
        write_header(
            &mut buf,
            ChunkType::Data,
            self.flags(),
            DATA_HEADER_SIZE - 4 + self.data.len(),
        );
        buf.extend_from_slice(&self.tsn.to_be_bytes());
        buf.extend_from_slice(&self.stream_id.to_be_bytes());
        buf.extend_from_slice(&self.stream_seq.to_be_bytes());
        buf.extend_from_slice(&self.ppid.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Parse from the chunk flags and value
    pub fn from_value(flags: u8, value: &[u8]) -> Result<Self> {
        if value.len() < DATA_HEADER_SIZE - 4 {
            return Err(NetworkError::InvalidPacket(
                "DATA chunk too short".to_string(),
            ));
        }

        Ok(Self {
            unordered: flags & FLAG_UNORDERED != 0,
            beginning: flags & FLAG_BEGINNING != 0,
            ending: flags & FLAG_ENDING != 0,
            immediate_sack: flags & FLAG_IMMEDIATE_SACK != 0,
            tsn: u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
            stream_id: u16::from_be_bytes([value[4], value[5]]),
            stream_seq: u16::from_be_bytes([value[6], value[7]]),
            ppid: u32::from_be_bytes([value[8], value[9], value[10], value[11]]),
            data: value[12..].to_vec(),
            sent_at: None,
            transmit_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sctp::chunk::SctpChunk;

    #[test]
    fn test_data_chunk_roundtrip() {
        let mut chunk = DataChunk::new(1234, 5, 10, ppid::BINARY, vec![1, 2, 3, 4, 5]);
        chunk.ending = false;
        chunk.unordered = true;

        let bytes = chunk.to_bytes();
        assert_eq!(bytes[1], FLAG_UNORDERED | FLAG_BEGINNING);
        // length counts the header and user data but not the padding
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 21);

        let SctpChunk::Data(parsed) = SctpChunk::from_bytes(&bytes).unwrap() else {
            panic!("expected DATA");
        };
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn test_short_data_rejected() {
        assert!(DataChunk::from_value(0, &[0; 8]).is_err());
    }
}
