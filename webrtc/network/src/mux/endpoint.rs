use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use super::demux::{MAX_BUFFER_SIZE, MuxInner};
use super::matcher::MatchFunc;
use crate::buffer::Buffer;
use crate::conn::Conn;
use crate::error::Result;

type OnClose = Box<dyn FnOnce() + Send>;

/// A filtered view of the mux's shared connection.
///
/// Reads drain the endpoint's private buffer; writes go straight to the
/// shared connection.
pub struct Endpoint {
    id: usize,
    matcher: MatchFunc,
    buffer: Buffer,
    on_close: Mutex<Option<OnClose>>,
    closed: AtomicBool,
    mux: Weak<MuxInner>,
    conn: Arc<dyn Conn>,
}

impl Endpoint {
    pub(crate) fn new(
        id: usize,
        matcher: MatchFunc,
        mux: Weak<MuxInner>,
        conn: Arc<dyn Conn>,
    ) -> Self {
        Self {
            id,
            matcher,
            buffer: Buffer::with_limit(MAX_BUFFER_SIZE),
            on_close: Mutex::new(None),
            closed: AtomicBool::new(false),
            mux,
            conn,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn matches(&self, packet: &[u8]) -> bool {
        (self.matcher)(packet)
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub(crate) fn close_buffer(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.buffer.close();
    }

    /// Callback run once, the first time the endpoint is closed.
    pub fn set_on_close<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.on_close.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(callback));
    }
}

impl Conn for Endpoint {
    fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.buffer.read(buf)
    }

    fn send(&self, buf: &[u8]) -> Result<usize> {
        self.conn.send(buf)
    }

    /// Runs the close callback, leaves the mux and closes the buffer.
    /// Closing twice is a no-op.
    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let callback = self
            .on_close
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(callback) = callback {
            callback();
        }

        if let Some(mux) = self.mux.upgrade() {
            mux.remove_endpoint(self.id);
        }
        self.buffer.close();
        Ok(())
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) -> Result<()> {
        self.buffer.set_read_deadline(deadline);
        Ok(())
    }

    /// Applies to the shared connection, so every endpoint is affected.
    fn set_write_deadline(&self, deadline: Option<Instant>) -> Result<()> {
        self.conn.set_write_deadline(deadline)
    }

    /// Sets this endpoint's read deadline and the shared connection's deadline.
    fn set_deadline(&self, deadline: Option<Instant>) -> Result<()> {
        self.buffer.set_read_deadline(deadline);
        self.conn.set_deadline(deadline)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.conn.local_addr()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.conn.remote_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::{Mux, MuxConfig, match_all, match_dtls};
    use crate::pipe::pipe;
    use logging::Logger;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_endpoint_read_deadline() {
        let (inside, _outside) = pipe();
        let mux = Mux::new(Arc::new(inside), &MuxConfig::default(), Logger::discard()).unwrap();
        let endpoint = mux.new_endpoint(match_all);

        endpoint
            .set_read_deadline(Some(Instant::now() + Duration::from_millis(10)))
            .unwrap();
        let mut buf = [0u8; 8192];
        let err = endpoint.recv(&mut buf).unwrap_err();
        assert!(err.is_timeout());

        mux.close().unwrap();
    }

    #[test]
    fn test_endpoint_write_reaches_shared_conn() {
        let (inside, outside) = pipe();
        let mux = Mux::new(Arc::new(inside), &MuxConfig::default(), Logger::discard()).unwrap();
        let endpoint = mux.new_endpoint(match_dtls);

        assert_eq!(endpoint.send(&[22, 254, 253]).unwrap(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(outside.recv(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[22, 254, 253]);
    }

    #[test]
    fn test_close_runs_callback_once_and_unregisters() {
        let (inside, _outside) = pipe();
        let mux = Mux::new(Arc::new(inside), &MuxConfig::default(), Logger::discard()).unwrap();
        let endpoint = mux.new_endpoint(match_dtls);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        endpoint.set_on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        endpoint.close().unwrap();
        endpoint.close().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(mux.endpoint_count(), 0);
        let mut buf = [0u8; 8];
        assert!(endpoint.recv(&mut buf).unwrap_err().is_closed());
    }
}
