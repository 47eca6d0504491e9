//! Round-robin record partitioning
//!
//! Residence records are assigned to workers with a fixed stride: worker `w`
//! of `W` owns every index `i` with `i % W == w`. The assignment needs no
//! coordination between workers and is identical on every run.
//!
//! ```text
//! records:  0 1 2 3 4 5 6
//! worker 0: 0     3     6
//! worker 1:   1     4
//! worker 2:     2     5
//! ```
//!
//! # Example
//!
//! ```
//! use proxpulse::partition::RecordPartitioner;
//!
//! let part = RecordPartitioner::new(5, 0, 2)?;
//! assert_eq!(part.indices().collect::<Vec<_>>(), vec![0, 2, 4]);
//! # Ok::<(), proxpulse::error::ProximityError>(())
//! ```

use crate::error::ProximityError;
use std::iter::FusedIterator;

/// Static stride assignment of record indices to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPartitioner {
    record_count: u64,
    worker_id: usize,
    worker_count: usize,
}

impl RecordPartitioner {
    /// Create the partition owned by `worker_id`
    ///
    /// Fails when `worker_count` is zero or `worker_id` is out of range.
    pub fn new(record_count: u64, worker_id: usize, worker_count: usize) -> Result<Self, ProximityError> {
        if worker_count == 0 || worker_id >= worker_count {
            return Err(ProximityError::InvalidTopology { worker_id, worker_count });
        }
        Ok(Self {
            record_count,
            worker_id,
            worker_count,
        })
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of records owned by this worker
    pub fn owned_count(&self) -> u64 {
        let start = self.worker_id as u64;
        if start >= self.record_count {
            return 0;
        }
        (self.record_count - start - 1) / self.worker_count as u64 + 1
    }

    /// Whether this worker owns no records at all
    pub fn is_empty(&self) -> bool {
        self.owned_count() == 0
    }

    /// Whether `index` belongs to this worker
    pub fn owns(&self, index: u64) -> bool {
        index < self.record_count && index % self.worker_count as u64 == self.worker_id as u64
    }

    /// Owned indices in ascending order
    pub fn indices(&self) -> StrideIndices {
        StrideIndices {
            next: self.worker_id as u64,
            end: self.record_count,
            stride: self.worker_count as u64,
        }
    }

    /// Byte offset of record `index` in a fixed-width layout
    #[inline]
    pub fn byte_offset(index: u64, record_size: u64) -> u64 {
        index * record_size
    }
}

/// Lazy iterator over a worker's record indices
#[derive(Debug, Clone)]
pub struct StrideIndices {
    next: u64,
    end: u64,
    stride: u64,
}

impl Iterator for StrideIndices {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        // saturating: a stride past u64::MAX simply ends the sequence
        self.next = self.next.saturating_add(self.stride);
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next >= self.end {
            0
        } else {
            ((self.end - self.next - 1) / self.stride + 1) as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StrideIndices {}

impl FusedIterator for StrideIndices {}
