//! Packet demultiplexer (RFC 7983)
//!
//! One shared datagram endpoint, typically the ICE connection, carries STUN,
//! DTLS, SRTP and SRTCP at once. The mux reads it on a single worker thread
//! and hands each datagram to the first registered [`Endpoint`] whose match
//! function accepts it.
//!
//! ```text
//!                 ┌──────────── Mux ─────────────┐
//!  shared Conn ──▶│ read loop ─▶ match_dtls  ─▶ Endpoint (DTLS)
//!                 │           ─▶ match_srtp  ─▶ Endpoint (SRTP)
//!                 │           ─▶ match_srtcp ─▶ Endpoint (SRTCP)
//!                 │           ─▶ (none)      ─▶ pending queue
//!                 └──────────────────────────────┘
//! ```

mod demux;
mod endpoint;
mod matcher;

pub use demux::{MAX_BUFFER_SIZE, MAX_PENDING_PACKETS, Mux, MuxConfig};
pub use endpoint::Endpoint;
pub use matcher::{
    MatchFunc, PacketType, classify_packet, match_all, match_dtls, match_range, match_srtcp,
    match_srtp, match_stun, match_turn, match_zrtp,
};
