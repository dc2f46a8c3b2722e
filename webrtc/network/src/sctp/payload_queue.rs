//! DATA chunks ordered by TSN.
//!
//! The receiver keeps chunks that arrived beyond its cumulative TSN here and
//! derives gap ack blocks from them; the sender keeps in-flight chunks here
//! until they are acknowledged.

use super::chunk::{DataChunk, GapAckBlock};
use super::sna::{sna32_gt, sna32_lt, sna32_lte};

#[derive(Debug, Default)]
pub struct PayloadQueue {
    chunks: Vec<DataChunk>,
    duplicates: Vec<u32>,
    n_bytes: usize,
}

impl PayloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, tsn: u32) -> Result<usize, usize> {
        self.chunks.binary_search_by(|c| {
            if c.tsn == tsn {
                std::cmp::Ordering::Equal
            } else if sna32_lt(c.tsn, tsn) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        })
    }

    /// Inserts `chunk` unless its TSN is already acknowledged by
    /// `cumulative_tsn` or already queued; either case records a duplicate
    /// and returns false.
    pub fn push(&mut self, chunk: DataChunk, cumulative_tsn: u32) -> bool {
        if sna32_lte(chunk.tsn, cumulative_tsn) {
            self.duplicates.push(chunk.tsn);
            return false;
        }
        match self.position(chunk.tsn) {
            Ok(_) => {
                self.duplicates.push(chunk.tsn);
                false
            }
            Err(index) => {
                self.n_bytes += chunk.data.len();
                self.chunks.insert(index, chunk);
                true
            }
        }
    }

    /// Removes the head chunk if it carries `tsn`.
    pub fn pop(&mut self, tsn: u32) -> Option<DataChunk> {
        if self.chunks.first().is_some_and(|c| c.tsn == tsn) {
            let chunk = self.chunks.remove(0);
            self.n_bytes -= chunk.data.len();
            Some(chunk)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, tsn: u32) -> Option<&mut DataChunk> {
        self.position(tsn).ok().map(move |i| &mut self.chunks[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataChunk> {
        self.chunks.iter()
    }

    /// Duplicate TSNs seen since the last call.
    pub fn pop_duplicates(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.duplicates)
    }

    /// Runs of consecutive queued TSNs, as offsets from `cumulative_tsn`.
    pub fn get_gap_ack_blocks(&self, cumulative_tsn: u32) -> Vec<GapAckBlock> {
        let mut blocks: Vec<GapAckBlock> = Vec::new();

        for chunk in self.chunks.iter().filter(|c| sna32_gt(c.tsn, cumulative_tsn)) {
            let offset = chunk.tsn.wrapping_sub(cumulative_tsn);
            // offsets beyond a u16 cannot be reported
            let Ok(offset) = u16::try_from(offset) else {
                break;
            };
            match blocks.last_mut() {
                Some(block) if block.end.wrapping_add(1) == offset => block.end = offset,
                _ => blocks.push(GapAckBlock::new(offset, offset)),
            }
        }

        blocks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total user data bytes queued
    pub fn n_bytes(&self) -> usize {
        self.n_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sctp::chunk::ppid;

    fn chunk(tsn: u32) -> DataChunk {
        DataChunk::new(tsn, 0, 0, ppid::BINARY, vec![0; 10])
    }

    #[test]
    fn test_push_keeps_tsn_order() {
        let mut queue = PayloadQueue::new();
        for tsn in [5, 3, 4, 7] {
            assert!(queue.push(chunk(tsn), 1));
        }
        let order: Vec<u32> = queue.iter().map(|c| c.tsn).collect();
        assert_eq!(order, vec![3, 4, 5, 7]);
        assert_eq!(queue.n_bytes(), 40);
    }

    #[test]
    fn test_duplicates_recorded() {
        let mut queue = PayloadQueue::new();
        assert!(queue.push(chunk(10), 8));
        assert!(!queue.push(chunk(10), 8));
        assert!(!queue.push(chunk(7), 8));
        assert_eq!(queue.pop_duplicates(), vec![10, 7]);
        assert!(queue.pop_duplicates().is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_only_head() {
        let mut queue = PayloadQueue::new();
        queue.push(chunk(2), 0);
        queue.push(chunk(3), 0);
        assert!(queue.pop(3).is_none());
        assert_eq!(queue.pop(2).map(|c| c.tsn), Some(2));
        assert_eq!(queue.pop(3).map(|c| c.tsn), Some(3));
        assert!(queue.is_empty());
        assert_eq!(queue.n_bytes(), 0);
    }

    #[test]
    fn test_gap_ack_blocks() {
        let mut queue = PayloadQueue::new();
        assert!(queue.get_gap_ack_blocks(100).is_empty());

        for tsn in [102, 103, 105, 108, 109, 110] {
            queue.push(chunk(tsn), 100);
        }
        assert_eq!(
            queue.get_gap_ack_blocks(100),
            vec![
                GapAckBlock::new(2, 3),
                GapAckBlock::new(5, 5),
                GapAckBlock::new(8, 10)
            ]
        );
    }

    #[test]
    fn test_wrapping_tsns() {
        let mut queue = PayloadQueue::new();
        queue.push(chunk(1), u32::MAX - 2);
        queue.push(chunk(u32::MAX), u32::MAX - 2);
        let order: Vec<u32> = queue.iter().map(|c| c.tsn).collect();
        assert_eq!(order, vec![u32::MAX, 1]);
        assert_eq!(
            queue.get_gap_ack_blocks(u32::MAX - 2),
            vec![GapAckBlock::new(2, 2), GapAckBlock::new(4, 4)]
        );
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut queue = PayloadQueue::new();
        queue.push(chunk(1), 0);
        queue.push(chunk(2), 0);
        queue.get_mut(2).unwrap().transmit_count = 3;
        assert!(queue.get_mut(4).is_none());
        let counts: Vec<(u32, u32)> = queue.iter().map(|c| (c.tsn, c.transmit_count)).collect();
        assert_eq!(counts, vec![(1, 0), (2, 3)]);
        assert_eq!(queue.n_bytes(), 20);
    }
}
