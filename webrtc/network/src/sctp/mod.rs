//! SCTP (Stream Control Transmission Protocol) for WebRTC data channels
//!
//! SCTP runs over DTLS and provides reliable, ordered, message-preserving
//! delivery on many independent streams.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐
//! │   Stream (read / write)     │
//! ├─────────────────────────────┤
//! │     SCTP Association        │  ← This module
//! ├─────────────────────────────┤
//! │  Conn (DTLS record layer)   │
//! └─────────────────────────────┘
//! ```
//!
//! ## Implemented Features
//!
//! - INIT/INIT-ACK/COOKIE-ECHO/COOKIE-ACK handshake with T1 retransmission
//! - DATA chunks with fragmentation, ordered and unordered delivery
//! - SACK with gap ack blocks and duplicate TSNs, T3-rtx retransmission
//! - HEARTBEAT, ABORT and ERROR handling
//!
//! ## Not Implemented
//!
//! - Multi-homing
//! - Path MTU discovery
//! - Graceful shutdown (SHUTDOWN chunks are parsed and ignored)
//! - Partial reliability extensions

pub mod association;
pub mod chunk;
pub mod error_cause;
pub mod packet;
pub mod param;
pub mod payload_queue;
pub mod reassembly_queue;
pub mod sna;
pub mod stream;
pub mod timer;

pub use association::{Association, AssociationConfig, AssociationState, MAX_MESSAGE_SIZE};
pub use chunk::{ChunkType, DataChunk, SctpChunk, ppid};
pub use error_cause::{ErrorCause, ErrorCauseCode};
pub use packet::SctpPacket;
pub use param::{Param, ParamType};
pub use stream::Stream;
