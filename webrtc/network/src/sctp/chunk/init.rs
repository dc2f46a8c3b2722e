//! INIT and INIT-ACK chunks, which share one layout.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Type = 1/2  |  Chunk Flags  |      Chunk Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Initiate Tag                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Advertised Receiver Window Credit (a_rwnd)          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Number of Outbound Streams   |  Number of Inbound Streams    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Initial TSN                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! /              Optional/Variable-Length Parameters              /
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::{ChunkType, write_header};
use crate::error::{NetworkError, Result};
use crate::sctp::param::Param;

const INIT_FIXED_SIZE: usize = 16;

/// Smallest a_rwnd a peer may advertise (RFC 4960 Section 3.3.2).
pub const MIN_ADVERTISED_WINDOW: u32 = 1500;

/// Body of an INIT or INIT-ACK chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitChunk {
    /// Initiate Tag
    pub initiate_tag: u32,
    /// Advertised Receiver Window Credit
    pub a_rwnd: u32,
    /// Number of outbound streams
    pub num_outbound_streams: u16,
    /// Number of inbound streams
    pub num_inbound_streams: u16,
    /// Initial TSN
    pub initial_tsn: u32,
    pub params: Vec<Param>,
}

impl InitChunk {
    /// Create new INIT chunk
    pub fn new(initiate_tag: u32, initial_tsn: u32) -> Self {
        Self {
            initiate_tag,
            a_rwnd: 131072, // 128KB default window
            num_outbound_streams: u16::MAX,
            num_inbound_streams: u16::MAX,
            initial_tsn,
            params: Vec::new(),
        }
    }

    /// Mandatory field checks (RFC 4960 Sections 3.3.2 and 3.3.3).
    pub fn check(&self) -> Result<()> {
        if self.initiate_tag == 0 {
            return Err(NetworkError::Protocol(
                "initiate tag must not be 0".to_string(),
            ));
        }
        if self.num_inbound_streams == 0 || self.num_outbound_streams == 0 {
            return Err(NetworkError::Protocol(
                "stream counts must not be 0".to_string(),
            ));
        }
        if self.a_rwnd < MIN_ADVERTISED_WINDOW {
            return Err(NetworkError::Protocol(format!(
                "a_rwnd {} below minimum of {}",
                self.a_rwnd, MIN_ADVERTISED_WINDOW
            )));
        }
        Ok(())
    }

    /// The State Cookie parameter, mandatory in INIT-ACK.
    pub fn state_cookie(&self) -> Option<&[u8]> {
        self.params.iter().find_map(|p| match p {
            Param::StateCookie(cookie) => Some(cookie.as_slice()),
            _ => None,
        })
    }

    pub(crate) fn to_bytes(&self, chunk_type: ChunkType) -> Vec<u8> {
        let params = Param::serialize_all(&self.params);
        let mut buf = Vec::with_capacity(4 + INIT_FIXED_SIZE + params.len());

        write_header(&mut buf, chunk_type, 0, INIT_FIXED_SIZE + params.len());
        buf.extend_from_slice(&self.initiate_tag.to_be_bytes());
        buf.extend_from_slice(&self.a_rwnd.to_be_bytes());
        buf.extend_from_slice(&self.num_outbound_streams.to_be_bytes());
        buf.extend_from_slice(&self.num_inbound_streams.to_be_bytes());
        buf.extend_from_slice(&self.initial_tsn.to_be_bytes());
        buf.extend_from_slice(&params);

        buf
    }

    pub(crate) fn from_value(flags: u8, value: &[u8]) -> Result<Self> {
        if value.len() < INIT_FIXED_SIZE {
            return Err(NetworkError::InvalidPacket(format!(
                "INIT chunk value of {} bytes, need {}",
                value.len(),
                INIT_FIXED_SIZE
            )));
        }
        if flags != 0 {
            return Err(NetworkError::InvalidPacket(
                "INIT chunk flags must be 0".to_string(),
            ));
        }

        Ok(Self {
            initiate_tag: u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
            a_rwnd: u32::from_be_bytes([value[4], value[5], value[6], value[7]]),
            num_outbound_streams: u16::from_be_bytes([value[8], value[9]]),
            num_inbound_streams: u16::from_be_bytes([value[10], value[11]]),
            initial_tsn: u32::from_be_bytes([value[12], value[13], value[14], value[15]]),
            params: Param::parse_all(&value[INIT_FIXED_SIZE..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sctp::chunk::SctpChunk;

    #[test]
    fn test_init_ack_roundtrip_with_cookie() {
        let mut chunk = InitChunk::new(123, 123);
        chunk.a_rwnd = 1024;
        chunk.num_outbound_streams = 1;
        chunk.num_inbound_streams = 1;
        chunk.params.push(Param::random_state_cookie());

        let bytes = SctpChunk::InitAck(chunk.clone()).to_bytes();
        let SctpChunk::InitAck(parsed) = SctpChunk::from_bytes(&bytes).unwrap() else {
            panic!("expected INIT-ACK");
        };
        assert_eq!(parsed, chunk);
        assert_eq!(parsed.state_cookie().map(<[u8]>::len), Some(32));
    }

    #[test]
    fn test_check_mandatory_fields() {
        let mut chunk = InitChunk::new(1, 1);
        assert!(chunk.check().is_ok());

        chunk.a_rwnd = 1499;
        assert!(chunk.check().is_err());

        let mut chunk = InitChunk::new(0, 1);
        assert!(chunk.check().is_err());
        chunk.initiate_tag = 7;
        chunk.num_inbound_streams = 0;
        assert!(chunk.check().is_err());
    }

    #[test]
    fn test_nonzero_flags_rejected() {
        let mut bytes = InitChunk::new(1, 1).to_bytes(ChunkType::Init);
        bytes[1] = 1;
        assert!(SctpChunk::from_bytes(&bytes).is_err());
    }
}
