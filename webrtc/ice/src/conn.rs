//! The packet connection returned by `Agent::dial` and `Agent::accept`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use network::Conn;

use crate::agent::Shared;

/// Datagram connection over the agent's selected candidate pair.
///
/// Reads return the non-STUN datagrams received on any local candidate;
/// writes go out on whichever pair is selected at the time. Closing the
/// connection closes the agent's sockets.
pub struct IceConn {
    shared: Arc<Shared>,
}

impl IceConn {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Conn for IceConn {
    fn recv(&self, buf: &mut [u8]) -> network::Result<usize> {
        self.shared.incoming().read(buf)
    }

    fn send(&self, buf: &[u8]) -> network::Result<usize> {
        Ok(self.shared.send(buf)?)
    }

    fn close(&self) -> network::Result<()> {
        self.shared.close();
        Ok(())
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> network::Result<()> {
        self.shared.incoming().set_read_deadline(deadline);
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.selected().map(|path| path.local)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.shared.selected().map(|path| path.remote)
    }
}

impl std::fmt::Debug for IceConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IceConn")
            .field("local", &self.local_addr())
            .field("remote", &self.remote_addr())
            .finish()
    }
}
