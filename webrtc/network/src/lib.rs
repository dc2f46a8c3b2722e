//! Network Module - packet endpoints, demultiplexing and SCTP
//!
//! Everything here speaks datagrams through the [`Conn`] trait: the mux
//! splits one shared connection into per-protocol endpoints, and the SCTP
//! association turns a secured endpoint into reliable message streams.

pub mod buffer;
pub mod conn;
pub mod error;
pub mod mux;
pub mod pipe;
pub mod sctp;

pub use buffer::Buffer;
pub use conn::Conn;
pub use error::{NetworkError, Result};
pub use mux::{Endpoint, Mux, MuxConfig};
pub use pipe::{PipeConn, pipe};
pub use sctp::{Association, AssociationConfig, AssociationState, Stream};
