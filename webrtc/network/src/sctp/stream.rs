//! SCTP streams
//!
//! A stream is a message-preserving channel inside an association. Inbound
//! fragments are handed over by the association's read loop and reassembled
//! here; outbound messages are fragmented here and handed to the association
//! for TSN assignment and transmission.

use std::sync::{Condvar, Mutex, MutexGuard, Weak};

use logging::Logger;

use super::association::AssociationInner;
use super::chunk::DataChunk;
use super::reassembly_queue::ReassemblyQueue;
use crate::error::{NetworkError, Result};

/// Largest user data carried by one DATA chunk.
pub const MAX_FRAGMENT_SIZE: usize = 1200;

struct StreamState {
    default_ppi: u32,
    reassembly: ReassemblyQueue,
    sequence_number: u16,
    closed: bool,
}

pub struct Stream {
    id: u16,
    association: Weak<AssociationInner>,
    state: Mutex<StreamState>,
    readable: Condvar,
    logger: Logger,
}

impl Stream {
    pub(crate) fn new(
        id: u16,
        default_ppi: u32,
        association: Weak<AssociationInner>,
        logger: Logger,
    ) -> Self {
        Self {
            id,
            association,
            state: Mutex::new(StreamState {
                default_ppi,
                reassembly: ReassemblyQueue::new(id),
                sequence_number: 0,
                closed: false,
            }),
            readable: Condvar::new(),
            logger,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stream_identifier(&self) -> u16 {
        self.id
    }

    /// Payload protocol identifier used by `write`.
    pub fn set_default_payload_type(&self, ppi: u32) {
        self.lock().default_ppi = ppi;
    }

    pub fn default_payload_type(&self) -> u32 {
        self.lock().default_ppi
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Reads one message, discarding its payload protocol identifier.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_sctp(buf).map(|(n, _)| n)
    }

    /// Blocks until a whole message is available and copies it into `buf`.
    ///
    /// Messages already reassembled are still returned after the stream is
    /// closed; after that `StreamClosed`. A message longer than `buf` is
    /// consumed, its prefix copied, and `ShortBuffer` returned.
    pub fn read_sctp(&self, buf: &mut [u8]) -> Result<(usize, u32)> {
        let mut state = self.lock();
        loop {
            if let Some(message) = state.reassembly.pop() {
                let len = message.data.len();
                if len > buf.len() {
                    buf.copy_from_slice(&message.data[..buf.len()]);
                    return Err(NetworkError::ShortBuffer {
                        needed: len,
                        available: buf.len(),
                    });
                }
                buf[..len].copy_from_slice(&message.data);
                return Ok((len, message.ppid));
            }
            if state.closed {
                return Err(NetworkError::StreamClosed);
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Writes one message with the default payload protocol identifier.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let ppi = self.default_payload_type();
        self.write_sctp(data, ppi)
    }

    /// Sends `data` as one message, fragmented into DATA chunks.
    pub fn write_sctp(&self, data: &[u8], ppi: u32) -> Result<usize> {
        let association = self
            .association
            .upgrade()
            .ok_or(NetworkError::AssociationClosed)?;

        if data.len() > association.max_message_size() {
            return Err(NetworkError::MessageTooLarge(data.len()));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let ssn = {
            let mut state = self.lock();
            if state.closed {
                return Err(NetworkError::StreamClosed);
            }
            let ssn = state.sequence_number;
            state.sequence_number = ssn.wrapping_add(1);
            ssn
        };

        let fragments = packetize(self.id, ssn, ppi, data);
        self.logger.trace(&format!(
            "stream {} ssn {}: {} bytes in {} fragments",
            self.id,
            ssn,
            data.len(),
            fragments.len()
        ));
        association.send_payload(fragments)?;
        Ok(data.len())
    }

    /// Closes the stream locally; pending and future reads fail once drained.
    pub fn close(&self) -> Result<()> {
        self.mark_closed();
        Ok(())
    }

    /// Queues an inbound fragment; wakes a reader once a message is complete.
    pub(crate) fn handle_data(&self, chunk: DataChunk) {
        let mut state = self.lock();
        if state.closed {
            self.logger
                .debug(&format!("stream {} closed, dropping TSN {}", self.id, chunk.tsn));
            return;
        }
        state.reassembly.push(chunk);
        if state.reassembly.is_readable() {
            self.readable.notify_all();
        }
    }

    /// Bytes held for reassembly or waiting to be read.
    pub(crate) fn buffered_bytes(&self) -> usize {
        self.lock().reassembly.n_bytes()
    }

    pub(crate) fn mark_closed(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            self.readable.notify_all();
        }
    }
}

/// Splits a message into DATA chunks with B on the first and E on the last.
fn packetize(stream_id: u16, ssn: u16, ppi: u32, data: &[u8]) -> Vec<DataChunk> {
    let count = data.len().div_ceil(MAX_FRAGMENT_SIZE);
    data.chunks(MAX_FRAGMENT_SIZE)
        .enumerate()
        .map(|(i, piece)| {
            // TSN is assigned by the association
            let mut chunk = DataChunk::new(0, stream_id, ssn, ppi, piece.to_vec());
            chunk.beginning = i == 0;
            chunk.ending = i + 1 == count;
            chunk
        })
        .collect()
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").field("id", &self.id).finish()
    }
}
