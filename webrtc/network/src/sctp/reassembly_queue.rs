//! Per-stream message reassembly.
//!
//! Ordered fragments are grouped by stream sequence number and released
//! strictly in sequence. Unordered fragments share no sequence number that
//! can be trusted, so they are kept by TSN and a message is cut out as soon
//! as a contiguous B..E run is present.

use super::chunk::DataChunk;
use super::sna::{sna16_lt, sna32_lt};

/// A fully reassembled user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub ppid: u32,
    pub data: Vec<u8>,
}

/// Fragments of one message, sorted by TSN
#[derive(Debug)]
struct ChunkSet {
    ssn: u16,
    chunks: Vec<DataChunk>,
}

impl ChunkSet {
    fn new(ssn: u16) -> Self {
        Self {
            ssn,
            chunks: Vec::new(),
        }
    }

    /// False if a fragment with the same TSN is already present.
    fn push(&mut self, chunk: DataChunk) -> bool {
        match self.chunks.iter().position(|c| !sna32_lt(c.tsn, chunk.tsn)) {
            Some(i) if self.chunks[i].tsn == chunk.tsn => false,
            Some(i) => {
                self.chunks.insert(i, chunk);
                true
            }
            None => {
                self.chunks.push(chunk);
                true
            }
        }
    }

    fn is_complete(&self) -> bool {
        let (Some(first), Some(last)) = (self.chunks.first(), self.chunks.last()) else {
            return false;
        };
        first.beginning
            && last.ending
            && self
                .chunks
                .windows(2)
                .all(|w| w[0].tsn.wrapping_add(1) == w[1].tsn)
    }

    fn into_message(self) -> Message {
        let ppid = self.chunks.first().map_or(0, |c| c.ppid);
        let data = self.chunks.into_iter().flat_map(|c| c.data).collect();
        Message { ppid, data }
    }
}

#[derive(Debug, Default)]
pub struct ReassemblyQueue {
    stream_id: u16,
    next_ssn: u16,
    ordered: Vec<ChunkSet>,
    /// Loose unordered fragments, sorted by TSN
    unordered_chunks: Vec<DataChunk>,
    /// Complete unordered messages, in completion order
    unordered: Vec<ChunkSet>,
    n_bytes: usize,
}

impl ReassemblyQueue {
    pub fn new(stream_id: u16) -> Self {
        Self {
            stream_id,
            ..Self::default()
        }
    }

    pub fn stream_id(&self) -> u16 {
        self.stream_id
    }

    /// Adds a fragment. Returns true if the fragment was kept.
    pub fn push(&mut self, chunk: DataChunk) -> bool {
        if chunk.stream_id != self.stream_id {
            return false;
        }

        let len = chunk.data.len();
        let kept = if chunk.unordered {
            self.push_unordered(chunk)
        } else {
            self.push_ordered(chunk)
        };
        if kept {
            self.n_bytes += len;
        }
        kept
    }

    fn push_ordered(&mut self, chunk: DataChunk) -> bool {
        // already delivered
        if sna16_lt(chunk.stream_seq, self.next_ssn) {
            return false;
        }

        let ssn = chunk.stream_seq;
        let index = match self.ordered.iter().position(|s| !sna16_lt(s.ssn, ssn)) {
            Some(i) if self.ordered[i].ssn == ssn => i,
            Some(i) => {
                self.ordered.insert(i, ChunkSet::new(ssn));
                i
            }
            None => {
                self.ordered.push(ChunkSet::new(ssn));
                self.ordered.len() - 1
            }
        };
        self.ordered[index].push(chunk)
    }

    fn push_unordered(&mut self, chunk: DataChunk) -> bool {
        let index = match self
            .unordered_chunks
            .iter()
            .position(|c| !sna32_lt(c.tsn, chunk.tsn))
        {
            Some(i) if self.unordered_chunks[i].tsn == chunk.tsn => return false,
            Some(i) => i,
            None => self.unordered_chunks.len(),
        };
        self.unordered_chunks.insert(index, chunk);

        if let Some(set) = self.take_complete_unordered() {
            self.unordered.push(set);
        }
        true
    }

    /// Cuts the first contiguous B..E run out of the loose fragments.
    fn take_complete_unordered(&mut self) -> Option<ChunkSet> {
        let mut start = None;
        let mut prev_tsn = 0u32;

        for (i, chunk) in self.unordered_chunks.iter().enumerate() {
            let continues = start.is_some() && prev_tsn.wrapping_add(1) == chunk.tsn;
            if chunk.beginning {
                start = Some(i);
            } else if !continues {
                start = None;
            }
            prev_tsn = chunk.tsn;

            if let Some(begin) = start
                && chunk.ending
            {
                let mut set = ChunkSet::new(chunk.stream_seq);
                set.chunks = self.unordered_chunks.drain(begin..=i).collect();
                return Some(set);
            }
        }
        None
    }

    /// True if `pop` would return a message.
    pub fn is_readable(&self) -> bool {
        !self.unordered.is_empty()
            || self
                .ordered
                .first()
                .is_some_and(|s| s.ssn == self.next_ssn && s.is_complete())
    }

    /// Next deliverable message: complete unordered messages first, then the
    /// ordered message carrying the expected sequence number.
    pub fn pop(&mut self) -> Option<Message> {
        let set = if !self.unordered.is_empty() {
            self.unordered.remove(0)
        } else {
            let head = self.ordered.first()?;
            if head.ssn != self.next_ssn || !head.is_complete() {
                return None;
            }
            self.next_ssn = self.next_ssn.wrapping_add(1);
            self.ordered.remove(0)
        };

        let message = set.into_message();
        self.n_bytes -= message.data.len();
        Some(message)
    }

    /// User data bytes held, complete or not
    pub fn n_bytes(&self) -> usize {
        self.n_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sctp::chunk::ppid;

    fn fragment(tsn: u32, ssn: u16, data: u8, beginning: bool, ending: bool) -> DataChunk {
        let mut chunk = DataChunk::new(tsn, 0, ssn, ppid::BINARY, vec![data]);
        chunk.beginning = beginning;
        chunk.ending = ending;
        chunk
    }

    fn unordered(tsn: u32, data: u8, beginning: bool, ending: bool) -> DataChunk {
        let mut chunk = fragment(tsn, 1, data, beginning, ending);
        chunk.unordered = true;
        chunk
    }

    #[test]
    fn test_ordered_then_unordered_interleaved() {
        let mut queue = ReassemblyQueue::new(0);

        assert!(queue.push(fragment(1, 0, 0, true, false)));
        assert!(queue.push(fragment(2, 0, 1, false, false)));
        assert!(queue.push(fragment(3, 0, 2, false, false)));
        assert!(!queue.is_readable());
        assert!(queue.push(fragment(4, 0, 3, false, true)));
        assert!(queue.is_readable());

        let message = queue.pop().unwrap();
        assert_eq!(message.data, vec![0, 1, 2, 3]);
        assert_eq!(message.ppid, ppid::BINARY);
        assert!(queue.pop().is_none());

        queue.push(fragment(1, 1, 0, true, false));
        queue.push(fragment(2, 1, 1, false, false));
        assert!(!queue.is_readable());

        queue.push(unordered(1, 0, true, false));
        queue.push(unordered(2, 1, false, true));
        assert!(queue.is_readable());

        queue.push(fragment(3, 1, 2, false, false));
        queue.push(fragment(4, 1, 3, false, true));

        assert_eq!(queue.pop().unwrap().data, vec![0, 1]);
        assert_eq!(queue.pop().unwrap().data, vec![0, 1, 2, 3]);
        assert!(queue.pop().is_none());
        assert_eq!(queue.n_bytes(), 0);
    }

    #[test]
    fn test_ordered_waits_for_expected_sequence() {
        let mut queue = ReassemblyQueue::new(0);
        queue.push(fragment(11, 1, 1, true, true));
        assert!(queue.pop().is_none());

        queue.push(fragment(10, 0, 0, true, true));
        assert_eq!(queue.pop().unwrap().data, vec![0]);
        assert_eq!(queue.pop().unwrap().data, vec![1]);
    }

    #[test]
    fn test_gap_in_fragments_is_incomplete() {
        let mut queue = ReassemblyQueue::new(0);
        queue.push(fragment(1, 0, 0, true, false));
        queue.push(fragment(3, 0, 2, false, true));
        assert!(!queue.is_readable());
        queue.push(fragment(2, 0, 1, false, false));
        assert_eq!(queue.pop().unwrap().data, vec![0, 1, 2]);
    }

    #[test]
    fn test_sequence_number_wraps() {
        let mut queue = ReassemblyQueue::new(0);
        queue.next_ssn = u16::MAX;

        queue.push(fragment(2, 0, 2, true, true));
        queue.push(fragment(1, u16::MAX, 1, true, true));

        assert_eq!(queue.pop().unwrap().data, vec![1]);
        assert_eq!(queue.pop().unwrap().data, vec![2]);
    }

    #[test]
    fn test_stale_and_duplicate_fragments_dropped() {
        let mut queue = ReassemblyQueue::new(0);
        queue.push(fragment(1, 0, 0, true, true));
        queue.pop().unwrap();

        assert!(!queue.push(fragment(2, 0, 9, true, true)));
        assert!(queue.push(fragment(3, 1, 1, true, false)));
        assert!(!queue.push(fragment(3, 1, 1, true, false)));
        assert_eq!(queue.n_bytes(), 1);
    }

    #[test]
    fn test_other_stream_rejected() {
        let mut queue = ReassemblyQueue::new(4);
        assert!(!queue.push(fragment(1, 0, 0, true, true)));
        assert_eq!(queue.stream_id(), 4);
    }
}
