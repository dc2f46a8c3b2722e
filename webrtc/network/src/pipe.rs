//! In-memory datagram pipe.
//!
//! Two connected [`PipeConn`]s; whatever one side sends the other receives,
//! one datagram at a time. Used to run the mux and the SCTP association
//! without sockets.

use std::sync::Arc;
use std::time::Instant;

use crate::buffer::Buffer;
use crate::conn::Conn;
use crate::error::{NetworkError, Result};

/// One end of a [`pipe`].
#[derive(Debug)]
pub struct PipeConn {
    incoming: Arc<Buffer>,
    outgoing: Arc<Buffer>,
}

/// Creates two connected endpoints.
pub fn pipe() -> (PipeConn, PipeConn) {
    let a_to_b = Arc::new(Buffer::new());
    let b_to_a = Arc::new(Buffer::new());

    (
        PipeConn {
            incoming: Arc::clone(&b_to_a),
            outgoing: Arc::clone(&a_to_b),
        },
        PipeConn {
            incoming: a_to_b,
            outgoing: b_to_a,
        },
    )
}

impl Conn for PipeConn {
    fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.incoming.read(buf)
    }

    fn send(&self, buf: &[u8]) -> Result<usize> {
        if self.incoming.is_closed() {
            return Err(NetworkError::Closed);
        }
        self.outgoing.write(buf)
    }

    /// Closes both directions; the peer drains what was already sent, then sees `Closed`.
    fn close(&self) -> Result<()> {
        self.incoming.close();
        self.outgoing.close();
        Ok(())
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> Result<()> {
        self.incoming.set_read_deadline(deadline);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pipe_preserves_datagrams() {
        let (a, b) = pipe();
        a.send(&[1, 2, 3]).unwrap();
        a.send(&[4]).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(b.recv(&mut buf).unwrap(), 3);
        assert_eq!(b.recv(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 4);
    }

    #[test]
    fn test_pipe_close_reaches_peer() {
        let (a, b) = pipe();
        a.close().unwrap();

        let mut buf = [0u8; 4];
        assert!(b.recv(&mut buf).unwrap_err().is_closed());
        assert!(a.send(&[0]).unwrap_err().is_closed());
    }

    #[test]
    fn test_pipe_read_deadline() {
        let (a, _b) = pipe();
        a.set_deadline(Some(Instant::now() + Duration::from_millis(10)))
            .unwrap();

        let mut buf = [0u8; 4];
        assert!(a.recv(&mut buf).unwrap_err().is_timeout());
    }
}
