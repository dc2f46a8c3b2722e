//! Datagram endpoint contract shared by every layer of the transport.

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::Result;

/// A bidirectional, datagram-preserving packet endpoint.
///
/// Implemented by mux endpoints, the ICE connection, in-memory pipes and any
/// external record layer (e.g. DTLS) that the SCTP association runs over.
/// Methods take `&self` so one endpoint can be read by a worker thread while
/// other threads write to it.
pub trait Conn: Send + Sync {
    /// Blocks until one datagram is available and copies it into `buf`.
    fn recv(&self, buf: &mut [u8]) -> Result<usize>;

    /// Sends one datagram.
    fn send(&self, buf: &[u8]) -> Result<usize>;

    /// Closes the endpoint and releases blocked readers.
    fn close(&self) -> Result<()>;

    /// Deadline for pending and future `recv` calls; `None` disables it.
    fn set_read_deadline(&self, _deadline: Option<Instant>) -> Result<()> {
        Ok(())
    }

    fn set_write_deadline(&self, _deadline: Option<Instant>) -> Result<()> {
        Ok(())
    }

    fn set_deadline(&self, deadline: Option<Instant>) -> Result<()> {
        self.set_read_deadline(deadline)?;
        self.set_write_deadline(deadline)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}
