use std::{
    cmp::Ordering,
    collections::BinaryHeap,
};

use common::time::UnixNanos;

use crate::iterator::{
    DecodeError,
    DecodedPoint,
    SeriesIterator,
};

struct HeapEntry {
    point: DecodedPoint,
    reader: usize,
}

impl HeapEntry {
    fn timestamp(&self) -> UnixNanos {
        self.point.datapoint.timestamp
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp() == other.timestamp() && self.reader == other.reader
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse the timestamp order so the
        // earliest point surfaces first, and among equal timestamps surface
        // the highest reader index, which is the duplicate that wins.
        other
            .timestamp()
            .cmp(&self.timestamp())
            .then(self.reader.cmp(&other.reader))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merge-sorts several encoded streams of the same (series, block) into one
/// sequence of strictly increasing timestamps.
///
/// Readers are ranked by position in the input: when two streams carry the
/// same timestamp, the point from the later reader wins and the earlier ones
/// are discarded. Callers therefore order readers oldest write first.
pub struct MultiSeriesIterator {
    readers: Vec<SeriesIterator>,
    heap: BinaryHeap<HeapEntry>,
    failed: bool,
}

impl MultiSeriesIterator {
    pub fn new(readers: Vec<SeriesIterator>) -> Result<Self, DecodeError> {
        let mut multi = Self {
            readers,
            heap: BinaryHeap::new(),
            failed: false,
        };
        for reader in 0..multi.readers.len() {
            multi.advance(reader)?;
        }
        Ok(multi)
    }

    fn advance(&mut self, reader: usize) -> Result<(), DecodeError> {
        if let Some(point) = self.readers[reader].next() {
            self.heap.push(HeapEntry {
                point: point?,
                reader,
            });
        }
        Ok(())
    }

    fn merge_next(&mut self) -> Result<Option<DecodedPoint>, DecodeError> {
        let Some(winner) = self.heap.pop() else {
            return Ok(None);
        };
        self.advance(winner.reader)?;
        // Discard every other occurrence of this timestamp.
        while self
            .heap
            .peek()
            .is_some_and(|duplicate| duplicate.timestamp() == winner.timestamp())
        {
            if let Some(duplicate) = self.heap.pop() {
                self.advance(duplicate.reader)?;
            }
        }
        Ok(Some(winner.point))
    }
}

impl Iterator for MultiSeriesIterator {
    type Item = Result<DecodedPoint, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.merge_next() {
            Ok(Some(point)) => Some(Ok(point)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            },
        }
    }
}
