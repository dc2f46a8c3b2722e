//! SACK chunk
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Type = 3    |Chunk  Flags   |      Chunk Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Cumulative TSN Ack                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Advertised Receiver Window Credit (a_rwnd)           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Number of Gap Ack Blocks = N  |  Number of Duplicate TSNs = X |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Gap Ack Block #1 Start       |   Gap Ack Block #1 End        |
//! /                              ...                              /
//! |                       Duplicate TSN X                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::{ChunkType, write_header};
use crate::error::{NetworkError, Result};

const SACK_FIXED_SIZE: usize = 12;

/// TSNs `cumulative_tsn + start ..= cumulative_tsn + end` were received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapAckBlock {
    pub start: u16,
    pub end: u16,
}

impl GapAckBlock {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }
}

/// SACK chunk for selective acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SackChunk {
    /// Cumulative TSN Ack
    pub cumulative_tsn: u32,
    /// Advertised Receiver Window Credit
    pub a_rwnd: u32,
    /// Gap Ack Blocks
    pub gap_ack_blocks: Vec<GapAckBlock>,
    /// Duplicate TSNs
    pub duplicate_tsns: Vec<u32>,
}

impl SackChunk {
    /// Create new SACK chunk
    pub fn new(cumulative_tsn: u32, a_rwnd: u32) -> Self {
        Self {
            cumulative_tsn,
            a_rwnd,
            gap_ack_blocks: Vec::new(),
            duplicate_tsns: Vec::new(),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let value_len =
            SACK_FIXED_SIZE + 4 * self.gap_ack_blocks.len() + 4 * self.duplicate_tsns.len();
        let mut buf = Vec::with_capacity(4 + value_len);

        write_header(&mut buf, ChunkType::Sack, 0, value_len);
        buf.extend_from_slice(&self.cumulative_tsn.to_be_bytes());
        buf.extend_from_slice(&self.a_rwnd.to_be_bytes());
        buf.extend_from_slice(&(self.gap_ack_blocks.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.duplicate_tsns.len() as u16).to_be_bytes());

        for block in &self.gap_ack_blocks {
            buf.extend_from_slice(&block.start.to_be_bytes());
            buf.extend_from_slice(&block.end.to_be_bytes());
        }
        for tsn in &self.duplicate_tsns {
            buf.extend_from_slice(&tsn.to_be_bytes());
        }

        buf
    }

    /// Parse from the chunk value
    pub fn from_value(value: &[u8]) -> Result<Self> {
        if value.len() < SACK_FIXED_SIZE {
            return Err(NetworkError::InvalidPacket(
                "SACK chunk too short".to_string(),
            ));
        }

        let cumulative_tsn = u32::from_be_bytes([value[0], value[1], value[2], value[3]]);
        let a_rwnd = u32::from_be_bytes([value[4], value[5], value[6], value[7]]);
        let num_gap_blocks = u16::from_be_bytes([value[8], value[9]]) as usize;
        let num_dup_tsns = u16::from_be_bytes([value[10], value[11]]) as usize;

        let needed = SACK_FIXED_SIZE + 4 * (num_gap_blocks + num_dup_tsns);
        if value.len() < needed {
            return Err(NetworkError::InvalidPacket(format!(
                "SACK declares {} gap blocks and {} duplicates but has {} bytes",
                num_gap_blocks,
                num_dup_tsns,
                value.len()
            )));
        }

        let mut words = value[SACK_FIXED_SIZE..needed].chunks_exact(4);
        let gap_ack_blocks = words
            .by_ref()
            .take(num_gap_blocks)
            .map(|w| {
                GapAckBlock::new(u16::from_be_bytes([w[0], w[1]]), u16::from_be_bytes([w[2], w[3]]))
            })
            .collect();
        let duplicate_tsns = words
            .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
            .collect();

        Ok(Self {
            cumulative_tsn,
            a_rwnd,
            gap_ack_blocks,
            duplicate_tsns,
        })
    }
}
