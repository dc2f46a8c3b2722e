//! SCTP chunk types and structures
//!
//! SCTP packets contain one or more chunks. Each chunk has a type, flags, a
//! length that counts the 4-byte header plus the value (never the trailing
//! padding), and the value itself.

mod data;
mod init;
mod sack;

pub use data::{DATA_HEADER_SIZE, DataChunk, ppid};
pub use init::{InitChunk, MIN_ADVERTISED_WINDOW};
pub use sack::{GapAckBlock, SackChunk};

use std::fmt;

use crate::error::{NetworkError, Result};
use crate::sctp::error_cause::ErrorCause;
use crate::sctp::param::Param;

pub const CHUNK_HEADER_SIZE: usize = 4;

/// ABORT / SHUTDOWN-COMPLETE: the sender filled in the receiver's own tag.
const FLAG_TCB_REFLECTED: u8 = 0x01;

/// SCTP chunk type identifiers (RFC 4960, RFC 3168 for CWR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    /// Payload data
    Data = 0,
    /// Initiate association
    Init = 1,
    /// Initiate acknowledgment
    InitAck = 2,
    /// Selective acknowledgment
    Sack = 3,
    /// Heartbeat request
    Heartbeat = 4,
    /// Heartbeat acknowledgment
    HeartbeatAck = 5,
    /// Abort association
    Abort = 6,
    /// Shutdown association
    Shutdown = 7,
    /// Shutdown acknowledgment
    ShutdownAck = 8,
    /// Operation error
    Error = 9,
    /// State cookie
    CookieEcho = 10,
    /// Cookie acknowledgment
    CookieAck = 11,
    /// Congestion window reduced
    Cwr = 13,
    /// Shutdown complete
    ShutdownComplete = 14,
}

impl ChunkType {
    /// Parse chunk type from byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Init),
            2 => Some(Self::InitAck),
            3 => Some(Self::Sack),
            4 => Some(Self::Heartbeat),
            5 => Some(Self::HeartbeatAck),
            6 => Some(Self::Abort),
            7 => Some(Self::Shutdown),
            8 => Some(Self::ShutdownAck),
            9 => Some(Self::Error),
            10 => Some(Self::CookieEcho),
            11 => Some(Self::CookieAck),
            13 => Some(Self::Cwr),
            14 => Some(Self::ShutdownComplete),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "DATA",
            Self::Init => "INIT",
            Self::InitAck => "INIT-ACK",
            Self::Sack => "SACK",
            Self::Heartbeat => "HEARTBEAT",
            Self::HeartbeatAck => "HEARTBEAT-ACK",
            Self::Abort => "ABORT",
            Self::Shutdown => "SHUTDOWN",
            Self::ShutdownAck => "SHUTDOWN-ACK",
            Self::Error => "ERROR",
            Self::CookieEcho => "COOKIE-ECHO",
            Self::CookieAck => "COOKIE-ACK",
            Self::Cwr => "CWR",
            Self::ShutdownComplete => "SHUTDOWN-COMPLETE",
        };
        f.write_str(name)
    }
}

/// Appends a chunk header for a value of `value_len` bytes.
pub(crate) fn write_header(buf: &mut Vec<u8>, chunk_type: ChunkType, flags: u8, value_len: usize) {
    buf.push(chunk_type as u8);
    buf.push(flags);
    buf.extend_from_slice(&((CHUNK_HEADER_SIZE + value_len) as u16).to_be_bytes());
}

fn control_chunk(chunk_type: ChunkType, flags: u8, value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CHUNK_HEADER_SIZE + value.len());
    write_header(&mut buf, chunk_type, flags, value.len());
    buf.extend_from_slice(value);
    buf
}

fn read_u32(value: &[u8], chunk_type: ChunkType) -> Result<u32> {
    let bytes: [u8; 4] = value
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| NetworkError::InvalidPacket(format!("{} chunk too short", chunk_type)))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Heartbeat-Info is the one parameter a HEARTBEAT (and its ACK) carries.
fn parse_heartbeat_info(value: &[u8], chunk_type: ChunkType) -> Result<Vec<u8>> {
    match Param::parse_all(value)?.into_iter().next() {
        Some(Param::HeartbeatInfo(info)) => Ok(info),
        _ => Err(NetworkError::InvalidPacket(format!(
            "{} without Heartbeat-Info parameter",
            chunk_type
        ))),
    }
}

/// Generic SCTP chunk wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SctpChunk {
    Data(DataChunk),
    Init(InitChunk),
    /// Same format as INIT, carries the State Cookie
    InitAck(InitChunk),
    Sack(SackChunk),
    Heartbeat { info: Vec<u8> },
    /// Echoes the Heartbeat-Info of the HEARTBEAT verbatim
    HeartbeatAck { info: Vec<u8> },
    Abort {
        tcb_reflected: bool,
        causes: Vec<ErrorCause>,
    },
    Shutdown { cumulative_tsn: u32 },
    ShutdownAck,
    Error { causes: Vec<ErrorCause> },
    /// Opaque cookie taken from the INIT-ACK
    CookieEcho(Vec<u8>),
    CookieAck,
    Cwr { lowest_tsn: u32 },
    ShutdownComplete { tcb_reflected: bool },
}

impl SctpChunk {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            SctpChunk::Data(_) => ChunkType::Data,
            SctpChunk::Init(_) => ChunkType::Init,
            SctpChunk::InitAck(_) => ChunkType::InitAck,
            SctpChunk::Sack(_) => ChunkType::Sack,
            SctpChunk::Heartbeat { .. } => ChunkType::Heartbeat,
            SctpChunk::HeartbeatAck { .. } => ChunkType::HeartbeatAck,
            SctpChunk::Abort { .. } => ChunkType::Abort,
            SctpChunk::Shutdown { .. } => ChunkType::Shutdown,
            SctpChunk::ShutdownAck => ChunkType::ShutdownAck,
            SctpChunk::Error { .. } => ChunkType::Error,
            SctpChunk::CookieEcho(_) => ChunkType::CookieEcho,
            SctpChunk::CookieAck => ChunkType::CookieAck,
            SctpChunk::Cwr { .. } => ChunkType::Cwr,
            SctpChunk::ShutdownComplete { .. } => ChunkType::ShutdownComplete,
        }
    }

    /// Parse one chunk. `data` spans exactly the chunk's declared length.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CHUNK_HEADER_SIZE {
            return Err(NetworkError::InvalidPacket("Chunk too short".to_string()));
        }

        let raw_type = data[0];
        let flags = data[1];
        let declared_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if declared_length < CHUNK_HEADER_SIZE || declared_length > data.len() {
            return Err(NetworkError::InvalidPacket(format!(
                "chunk length {} with {} bytes available",
                declared_length,
                data.len()
            )));
        }
        let value = &data[CHUNK_HEADER_SIZE..declared_length];

        let chunk_type = ChunkType::from_u8(raw_type).ok_or_else(|| {
            NetworkError::InvalidPacket(format!("unknown chunk type {}", raw_type))
        })?;

        Ok(match chunk_type {
            ChunkType::Data => SctpChunk::Data(DataChunk::from_value(flags, value)?),
            ChunkType::Init => SctpChunk::Init(InitChunk::from_value(flags, value)?),
            ChunkType::InitAck => SctpChunk::InitAck(InitChunk::from_value(flags, value)?),
            ChunkType::Sack => SctpChunk::Sack(SackChunk::from_value(value)?),
            ChunkType::Heartbeat => SctpChunk::Heartbeat {
                info: parse_heartbeat_info(value, chunk_type)?,
            },
            ChunkType::HeartbeatAck => SctpChunk::HeartbeatAck {
                info: parse_heartbeat_info(value, chunk_type)?,
            },
            ChunkType::Abort => SctpChunk::Abort {
                tcb_reflected: flags & FLAG_TCB_REFLECTED != 0,
                causes: ErrorCause::parse_all(value)?,
            },
            ChunkType::Shutdown => SctpChunk::Shutdown {
                cumulative_tsn: read_u32(value, chunk_type)?,
            },
            ChunkType::ShutdownAck => SctpChunk::ShutdownAck,
            ChunkType::Error => SctpChunk::Error {
                causes: ErrorCause::parse_all(value)?,
            },
            ChunkType::CookieEcho => SctpChunk::CookieEcho(value.to_vec()),
            ChunkType::CookieAck => SctpChunk::CookieAck,
            ChunkType::Cwr => SctpChunk::Cwr {
                lowest_tsn: read_u32(value, chunk_type)?,
            },
            ChunkType::ShutdownComplete => SctpChunk::ShutdownComplete {
                tcb_reflected: flags & FLAG_TCB_REFLECTED != 0,
            },
        })
    }

    /// Serialize chunk to bytes, without trailing padding
    pub fn to_bytes(&self) -> Vec<u8> {
        let chunk_type = self.chunk_type();
        match self {
            SctpChunk::Data(chunk) => chunk.to_bytes(),
            SctpChunk::Init(chunk) | SctpChunk::InitAck(chunk) => chunk.to_bytes(chunk_type),
            SctpChunk::Sack(chunk) => chunk.to_bytes(),
            SctpChunk::Heartbeat { info } | SctpChunk::HeartbeatAck { info } => control_chunk(
                chunk_type,
                0,
                &Param::HeartbeatInfo(info.clone()).to_bytes(),
            ),
            SctpChunk::Abort {
                tcb_reflected,
                causes,
            } => control_chunk(
                chunk_type,
                if *tcb_reflected { FLAG_TCB_REFLECTED } else { 0 },
                &ErrorCause::serialize_all(causes),
            ),
            SctpChunk::Error { causes } => {
                control_chunk(chunk_type, 0, &ErrorCause::serialize_all(causes))
            }
            SctpChunk::Shutdown {
                cumulative_tsn: tsn,
            }
            | SctpChunk::Cwr { lowest_tsn: tsn } => {
                control_chunk(chunk_type, 0, &tsn.to_be_bytes())
            }
            SctpChunk::CookieEcho(cookie) => control_chunk(chunk_type, 0, cookie),
            SctpChunk::CookieAck | SctpChunk::ShutdownAck => control_chunk(chunk_type, 0, &[]),
            SctpChunk::ShutdownComplete { tcb_reflected } => control_chunk(
                chunk_type,
                if *tcb_reflected { FLAG_TCB_REFLECTED } else { 0 },
                &[],
            ),
        }
    }

    /// Get padded length (for packet serialization)
    pub fn padded_len(&self) -> usize {
        (self.to_bytes().len() + 3) & !3
    }
}
