//! SCTP packet structure
//!
//! An SCTP packet consists of a common header followed by one or more chunks.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Source Port Number        |     Destination Port Number   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Verification Tag                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Checksum                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! /                            Chunks                             /
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The checksum is CRC-32C over the whole packet with the checksum field
//! zeroed, stored little-endian.

use crc::{CRC_32_ISCSI, Crc};

use super::chunk::{CHUNK_HEADER_SIZE, SctpChunk};
use crate::error::{NetworkError, Result};

/// SCTP common header size in bytes
pub const SCTP_HEADER_SIZE: usize = 12;

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

fn checksum(packet: &[u8]) -> u32 {
    let mut digest = CASTAGNOLI.digest();
    digest.update(&packet[..8]);
    digest.update(&[0u8; 4]);
    digest.update(&packet[SCTP_HEADER_SIZE..]);
    digest.finalize()
}

/// SCTP packet containing header and chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SctpPacket {
    /// Source port
    pub source_port: u16,
    /// Destination port
    pub destination_port: u16,
    /// Verification tag
    pub verification_tag: u32,
    /// Chunks in this packet
    pub chunks: Vec<SctpChunk>,
}

impl SctpPacket {
    /// Create a new SCTP packet
    pub fn new(source_port: u16, destination_port: u16, verification_tag: u32) -> Self {
        Self {
            source_port,
            destination_port,
            verification_tag,
            chunks: Vec::new(),
        }
    }

    /// Add a chunk to the packet
    pub fn add_chunk(&mut self, chunk: SctpChunk) {
        self.chunks.push(chunk);
    }

    /// Serialize packet to bytes, padding every chunk to 4 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SCTP_HEADER_SIZE + 64);

        buf.extend_from_slice(&self.source_port.to_be_bytes());
        buf.extend_from_slice(&self.destination_port.to_be_bytes());
        buf.extend_from_slice(&self.verification_tag.to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);

        for chunk in &self.chunks {
            let chunk_bytes = chunk.to_bytes();
            let padding = (4 - (chunk_bytes.len() % 4)) % 4;
            buf.extend_from_slice(&chunk_bytes);
            buf.extend(std::iter::repeat_n(0u8, padding));
        }

        let sum = checksum(&buf);
        buf[8..12].copy_from_slice(&sum.to_le_bytes());
        buf
    }

    /// Parse and checksum-verify a packet. Any malformed chunk fails the
    /// whole packet.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < SCTP_HEADER_SIZE {
            return Err(NetworkError::InvalidPacket(format!(
                "SCTP packet too short: {} bytes",
                data.len()
            )));
        }

        let theirs = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        let ours = checksum(data);
        if ours != theirs {
            return Err(NetworkError::ChecksumMismatch { ours, theirs });
        }

        let source_port = u16::from_be_bytes([data[0], data[1]]);
        let destination_port = u16::from_be_bytes([data[2], data[3]]);
        let verification_tag = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

        let mut chunks = Vec::new();
        let mut offset = SCTP_HEADER_SIZE;

        while offset < data.len() {
            let rest = &data[offset..];
            if rest.len() < CHUNK_HEADER_SIZE {
                return Err(NetworkError::InvalidPacket(format!(
                    "{} trailing bytes after last chunk",
                    rest.len()
                )));
            }

            let declared_length = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            if declared_length < CHUNK_HEADER_SIZE || declared_length > rest.len() {
                return Err(NetworkError::InvalidPacket(format!(
                    "chunk length {} at offset {} exceeds packet",
                    declared_length, offset
                )));
            }

            chunks.push(SctpChunk::from_bytes(&rest[..declared_length])?);

            // The final chunk may omit its padding.
            offset += ((declared_length + 3) & !3).min(rest.len());
        }

        if chunks.is_empty() {
            return Err(NetworkError::InvalidPacket(
                "SCTP packet without chunks".to_string(),
            ));
        }

        Ok(Self {
            source_port,
            destination_port,
            verification_tag,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sctp::chunk::{DataChunk, InitChunk, ppid};
    use crate::sctp::param::Param;

    const INIT_PACKET: [u8; 100] = [
        0x13, 0x88, 0x13, 0x88, 0x00, 0x00, 0x00, 0x00, 0x81, 0x46, 0x9d, 0xfc, 0x01, 0x00, 0x00,
        0x56, 0x55, 0xb9, 0x64, 0xa5, 0x00, 0x02, 0x00, 0x00, 0x04, 0x00, 0x08, 0x00, 0xe8, 0x6d,
        0x10, 0x30, 0xc0, 0x00, 0x00, 0x04, 0x80, 0x08, 0x00, 0x09, 0xc0, 0x0f, 0xc1, 0x80, 0x82,
        0x00, 0x00, 0x00, 0x80, 0x02, 0x00, 0x24, 0x9f, 0xeb, 0xbb, 0x5c, 0x50, 0xc9, 0xbf, 0x75,
        0x9c, 0xb1, 0x2c, 0x57, 0x4f, 0xa4, 0x5a, 0x51, 0xba, 0x60, 0x17, 0x78, 0x27, 0x94, 0x5c,
        0x31, 0xe6, 0x5d, 0x5b, 0x09, 0x47, 0xe2, 0x22, 0x06, 0x80, 0x04, 0x00, 0x06, 0x00, 0x01,
        0x00, 0x00, 0x80, 0x03, 0x00, 0x06, 0x80, 0xc1, 0x00, 0x00,
    ];

    const INIT_ACK_PACKET: [u8; 40] = [
        0x13, 0x88, 0x13, 0x88, 0xce, 0x15, 0x79, 0xa2, 0x96, 0x19, 0xe8, 0xb2, 0x02, 0x00, 0x00,
        0x1c, 0xeb, 0x81, 0x4e, 0x01, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x08, 0x00, 0x50, 0xdf,
        0x90, 0xd9, 0x00, 0x07, 0x00, 0x08, 0x94, 0x06, 0x2f, 0x93,
    ];

    #[test]
    fn test_parse_captured_init() {
        let packet = SctpPacket::from_bytes(&INIT_PACKET).unwrap();
        assert_eq!(packet.source_port, 5000);
        assert_eq!(packet.destination_port, 5000);
        assert_eq!(packet.verification_tag, 0);
        assert_eq!(packet.chunks.len(), 1);

        let SctpChunk::Init(init) = &packet.chunks[0] else {
            panic!("expected INIT, got {:?}", packet.chunks[0]);
        };
        assert_eq!(init.initiate_tag, 1438213285);
        assert_eq!(init.a_rwnd, 131072);
        assert_eq!(init.num_outbound_streams, 1024);
        assert_eq!(init.num_inbound_streams, 2048);
        assert_eq!(init.initial_tsn, 3899461680);
        assert!(init.check().is_ok());
        assert!(
            init.params
                .iter()
                .any(|p| matches!(p, Param::ForwardTsnSupported))
        );
    }

    #[test]
    fn test_parse_captured_init_ack() {
        let packet = SctpPacket::from_bytes(&INIT_ACK_PACKET).unwrap();
        assert_eq!(packet.verification_tag, 0xce1579a2);

        let SctpChunk::InitAck(ack) = &packet.chunks[0] else {
            panic!("expected INIT-ACK");
        };
        assert_eq!(ack.initiate_tag, 0xeb814e01);
        assert_eq!(ack.state_cookie(), Some(&[0x94, 0x06, 0x2f, 0x93][..]));
        // zero window parses but does not pass validation
        assert!(ack.check().is_err());
    }

    #[test]
    fn test_packet_roundtrip() {
        let mut packet = SctpPacket::new(5000, 5000, 0x12345678);
        packet.add_chunk(SctpChunk::Data(DataChunk::new(
            1,
            0,
            0,
            ppid::BINARY,
            vec![1, 2, 3],
        )));
        packet.add_chunk(SctpChunk::CookieAck);

        let bytes = packet.to_bytes();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(SctpPacket::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_unpadded_last_chunk_accepted() {
        let mut packet = SctpPacket::new(1, 2, 3);
        packet.add_chunk(SctpChunk::CookieEcho(vec![7, 7, 7]));
        let mut bytes = packet.to_bytes();
        bytes.truncate(bytes.len() - 1);
        let sum = checksum(&bytes);
        bytes[8..12].copy_from_slice(&sum.to_le_bytes());

        let parsed = SctpPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.chunks, vec![SctpChunk::CookieEcho(vec![7, 7, 7])]);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = INIT_PACKET;
        bytes[20] ^= 0xFF;
        let err = SctpPacket::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, NetworkError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_unknown_chunk_fails_packet() {
        let mut packet = SctpPacket::new(1, 2, 3);
        packet.add_chunk(SctpChunk::CookieAck);
        let mut bytes = packet.to_bytes();
        bytes[12] = 0x40;
        let sum = checksum(&bytes);
        bytes[8..12].copy_from_slice(&sum.to_le_bytes());
        assert!(SctpPacket::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_init_bytes_reencode() {
        let mut init = InitChunk::new(1, 2);
        init.params.push(Param::ForwardTsnSupported);
        let mut packet = SctpPacket::new(5000, 5000, 0);
        packet.add_chunk(SctpChunk::Init(init));
        let parsed = SctpPacket::from_bytes(&packet.to_bytes()).unwrap();
        assert_eq!(parsed, packet);
    }
}
