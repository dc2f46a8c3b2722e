//! Bounded FIFO of datagrams with blocking reads.
//!
//! Each mux endpoint and each in-memory pipe direction owns one `Buffer`.
//! Writers never block: a write that would push the buffer past its byte
//! limit fails with [`NetworkError::BufferFull`] and the caller drops the
//! packet.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use crate::error::{NetworkError, Result};

#[derive(Debug, Default)]
struct State {
    packets: VecDeque<Vec<u8>>,
    size: usize,
    limit: usize,
    closed: bool,
    deadline: Option<Instant>,
}

/// Datagram buffer shared between one producer side and one reader side.
#[derive(Debug, Default)]
pub struct Buffer {
    state: Mutex<State>,
    readable: Condvar,
}

impl Buffer {
    /// Creates an unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer holding at most `limit` bytes of payload; 0 means unbounded.
    pub fn with_limit(limit: usize) -> Self {
        let buffer = Self::default();
        buffer.lock().limit = limit;
        buffer
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a poisoned lock only means a reader panicked; the queue itself is intact
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends one datagram.
    pub fn write(&self, packet: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(NetworkError::Closed);
        }
        if state.limit > 0 && state.size + packet.len() > state.limit {
            return Err(NetworkError::BufferFull);
        }

        state.packets.push_back(packet.to_vec());
        state.size += packet.len();
        drop(state);

        self.readable.notify_one();
        Ok(packet.len())
    }

    /// Pops the oldest datagram into `buf`.
    ///
    /// Blocks until a datagram arrives, the buffer is closed and drained
    /// (`Closed`) or the read deadline passes (`Timeout`). A datagram larger
    /// than `buf` is consumed: its prefix is copied and `ShortBuffer` is
    /// returned.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        loop {
            if let Some(packet) = state.packets.pop_front() {
                state.size -= packet.len();
                if packet.len() > buf.len() {
                    buf.copy_from_slice(&packet[..buf.len()]);
                    return Err(NetworkError::ShortBuffer {
                        needed: packet.len(),
                        available: buf.len(),
                    });
                }
                buf[..packet.len()].copy_from_slice(&packet);
                return Ok(packet.len());
            }
            if state.closed {
                return Err(NetworkError::Closed);
            }

            state = match state.deadline {
                None => self
                    .readable
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(NetworkError::Timeout);
                    }
                    self.readable
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }

    /// Changes the read deadline and wakes blocked readers so they re-check it.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.lock().deadline = deadline;
        self.readable.notify_all();
    }

    /// Rejects further writes; readers drain what is queued, then get `Closed`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of queued datagrams.
    pub fn count(&self) -> usize {
        self.lock().packets.len()
    }

    /// Bytes of payload currently queued.
    pub fn size(&self) -> usize {
        self.lock().size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let buffer = Buffer::new();
        buffer.write(&[1]).unwrap();
        buffer.write(&[2, 2]).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(buffer.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 1);
        assert_eq!(buffer.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[2, 2]);
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn test_limit_rejects_overflow() {
        let buffer = Buffer::with_limit(4);
        buffer.write(&[0; 3]).unwrap();
        assert!(matches!(
            buffer.write(&[0; 2]),
            Err(NetworkError::BufferFull)
        ));
        assert_eq!(buffer.count(), 1);
    }

    #[test]
    fn test_short_buffer_consumes_packet() {
        let buffer = Buffer::new();
        buffer.write(&[1, 2, 3, 4]).unwrap();
        buffer.write(&[5]).unwrap();

        let mut small = [0u8; 2];
        assert!(matches!(
            buffer.read(&mut small),
            Err(NetworkError::ShortBuffer {
                needed: 4,
                available: 2
            })
        ));
        assert_eq!(small, [1, 2]);
        assert_eq!(buffer.read(&mut small).unwrap(), 1);
        assert_eq!(small[0], 5);
    }

    #[test]
    fn test_close_drains_then_fails() {
        let buffer = Buffer::new();
        buffer.write(&[7]).unwrap();
        buffer.close();

        assert!(matches!(buffer.write(&[8]), Err(NetworkError::Closed)));
        let mut buf = [0u8; 4];
        assert_eq!(buffer.read(&mut buf).unwrap(), 1);
        assert!(matches!(buffer.read(&mut buf), Err(NetworkError::Closed)));
    }

    #[test]
    fn test_read_deadline_times_out() {
        let buffer = Buffer::new();
        buffer.set_read_deadline(Some(Instant::now() + Duration::from_millis(50)));

        let start = Instant::now();
        let mut buf = [0u8; 4];
        let err = buffer.read(&mut buf).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_blocked_read_woken_by_write() {
        let buffer = Arc::new(Buffer::new());
        let reader = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                buffer.read(&mut buf).map(|n| buf[..n].to_vec())
            })
        };

        thread::sleep(Duration::from_millis(20));
        buffer.write(&[9, 9]).unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), vec![9, 9]);
    }

    #[test]
    fn test_blocked_read_released_by_close() {
        let buffer = Arc::new(Buffer::new());
        let reader = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut buf = [0u8; 4];
                buffer.read(&mut buf)
            })
        };

        thread::sleep(Duration::from_millis(20));
        buffer.close();
        assert!(reader.join().unwrap().unwrap_err().is_closed());
    }
}
