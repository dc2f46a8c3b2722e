use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use logging::Logger;
use serde::Deserialize;

use super::endpoint::Endpoint;
use crate::conn::Conn;
use crate::error::{NetworkError, Result};

/// Maximum number of bytes an endpoint buffers before dropping packets.
pub const MAX_BUFFER_SIZE: usize = 1000 * 1000;

/// Unclaimed datagrams kept until a matching endpoint registers.
pub const MAX_PENDING_PACKETS: usize = 15;

/// Mux settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Size of the read buffer for the shared connection; larger datagrams are truncated.
    pub buffer_size: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self { buffer_size: 8192 }
    }
}

#[derive(Default)]
struct MuxState {
    endpoints: Vec<Arc<Endpoint>>,
    pending: VecDeque<Vec<u8>>,
    closed: bool,
}

pub(crate) struct MuxInner {
    conn: Arc<dyn Conn>,
    state: Mutex<MuxState>,
    next_id: AtomicUsize,
    logger: Logger,
}

/// Demultiplexes one shared connection onto several [`Endpoint`]s.
pub struct Mux {
    inner: Arc<MuxInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Mux {
    /// Starts the read loop over `conn`.
    ///
    /// # Errors
    ///
    /// Returns error if the worker thread cannot be spawned or the buffer
    /// size is zero.
    pub fn new(conn: Arc<dyn Conn>, config: &MuxConfig, logger: Logger) -> Result<Self> {
        if config.buffer_size == 0 {
            return Err(NetworkError::Config(
                "mux buffer_size must be positive".to_string(),
            ));
        }

        let inner = Arc::new(MuxInner {
            conn,
            state: Mutex::new(MuxState::default()),
            next_id: AtomicUsize::new(0),
            logger,
        });

        let worker = {
            let inner = Arc::clone(&inner);
            let buffer_size = config.buffer_size;
            thread::Builder::new()
                .name("mux-read".to_string())
                .spawn(move || inner.read_loop(buffer_size))?
        };

        Ok(Self {
            inner,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Registers an endpoint receiving every datagram `matcher` accepts.
    ///
    /// Pending datagrams are re-examined; matching ones are delivered to the
    /// new endpoint right away, the rest stay pending.
    pub fn new_endpoint<F>(&self, matcher: F) -> Arc<Endpoint>
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.inner.new_endpoint(Box::new(matcher))
    }

    /// Removes an endpoint from dispatch without closing its buffer.
    pub fn remove_endpoint(&self, endpoint: &Endpoint) {
        self.inner.remove_endpoint(endpoint.id());
    }

    /// Number of datagrams waiting for an endpoint.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner.lock().endpoints.len()
    }

    /// Closes every endpoint and the shared connection, then waits for the
    /// read loop to exit. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        let endpoints = {
            let mut state = self.inner.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.pending.clear();
            std::mem::take(&mut state.endpoints)
        };

        for endpoint in &endpoints {
            endpoint.close_buffer();
        }
        let result = self.inner.conn.close();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = worker
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            self.inner.logger.error("mux read loop panicked");
        }

        self.inner.logger.debug("mux closed");
        result
    }
}

impl Drop for Mux {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl MuxInner {
    fn lock(&self) -> MutexGuard<'_, MuxState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn new_endpoint(self: &Arc<Self>, matcher: super::MatchFunc) -> Arc<Endpoint> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let endpoint = Arc::new(Endpoint::new(
            id,
            matcher,
            Arc::downgrade(self),
            Arc::clone(&self.conn),
        ));

        let mut state = self.lock();
        if state.closed {
            endpoint.close_buffer();
            return endpoint;
        }
        state.endpoints.push(Arc::clone(&endpoint));

        // delivered under the lock so pending packets stay ahead of new arrivals
        let mut still_pending = VecDeque::with_capacity(state.pending.len());
        for packet in state.pending.drain(..) {
            if !endpoint.matches(&packet) {
                still_pending.push_back(packet);
                continue;
            }
            if let Err(e) = endpoint.buffer().write(&packet) {
                self.logger
                    .warn(&format!("dropping pending packet for endpoint {}: {}", id, e));
            }
        }
        state.pending = still_pending;

        endpoint
    }

    pub(crate) fn remove_endpoint(&self, id: usize) {
        self.lock().endpoints.retain(|e| e.id() != id);
    }

    fn read_loop(&self, buffer_size: usize) {
        let mut buf = vec![0u8; buffer_size];
        loop {
            let n = match self.conn.recv(&mut buf) {
                Ok(n) => n,
                Err(NetworkError::Closed | NetworkError::Eof) => {
                    self.logger.debug("shared connection closed, stopping read loop");
                    return;
                }
                Err(e @ (NetworkError::ShortBuffer { .. } | NetworkError::Timeout)) => {
                    self.logger.warn(&format!("mux read: {}", e));
                    continue;
                }
                Err(e) => {
                    self.logger
                        .error(&format!("mux read failed, stopping read loop: {}", e));
                    return;
                }
            };

            if let Err(e) = self.dispatch(&buf[..n]) {
                self.logger.debug(&format!("stopping read loop: {}", e));
                return;
            }
        }
    }

    /// Routes one datagram.
    ///
    /// Only an error that means the mux is shutting down is returned; every
    /// per-packet problem is logged and the packet dropped.
    fn dispatch(&self, packet: &[u8]) -> Result<()> {
        let Some(&first) = packet.first() else {
            self.logger.warn("dropping zero length packet");
            return Ok(());
        };

        let endpoint = {
            let mut state = self.lock();
            match state.endpoints.iter().find(|e| e.matches(packet)) {
                Some(endpoint) => Arc::clone(endpoint),
                None => {
                    if state.closed {
                        return Err(NetworkError::Closed);
                    }
                    if state.pending.len() < MAX_PENDING_PACKETS {
                        self.logger.trace(&format!(
                            "no endpoint for packet starting with {}, queueing",
                            first
                        ));
                        state.pending.push_back(packet.to_vec());
                    } else {
                        self.logger.warn(&format!(
                            "pending queue full, dropping packet starting with {}",
                            first
                        ));
                    }
                    return Ok(());
                }
            }
        };

        match endpoint.buffer().write(packet) {
            Ok(_) => Ok(()),
            Err(NetworkError::BufferFull) => {
                self.logger.warn(&format!(
                    "endpoint {} buffer full, dropping packet",
                    endpoint.id()
                ));
                Ok(())
            }
            // an endpoint closing on its own races with dispatch; only a mux close ends the loop
            Err(NetworkError::Closed) if !self.lock().closed => Ok(()),
            Err(e) => Err(e),
        }
    }
}
