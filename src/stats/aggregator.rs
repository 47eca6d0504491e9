//! Tally aggregation
//!
//! Collects the tallies contributed by every worker of a run and turns them
//! into the coordinator's view: the per-worker table ordered by worker id, and
//! one global [`AggregateResult`].
//!
//! Individual tallies stay separately inspectable; the aggregate is derived
//! from them on demand and never replaces them.
//!
//! # Example
//!
//! ```
//! use proxpulse::classify::Band;
//! use proxpulse::stats::{LocalAggregator, aggregator::TallyAggregator};
//!
//! let mut w0 = LocalAggregator::new(0);
//! w0.record(Band::WithinOne);
//! let mut w1 = LocalAggregator::new(1);
//! w1.record(Band::TwoToFive);
//!
//! let mut aggregator = TallyAggregator::new(2);
//! aggregator.add_worker(w1.finalize())?;
//! aggregator.add_worker(w0.finalize())?;
//!
//! let (per_worker, aggregate) = aggregator.finish()?;
//! assert_eq!(per_worker[0].worker_id, 0);
//! assert_eq!(aggregate.total_processed, 2);
//! # Ok::<(), proxpulse::error::ProximityError>(())
//! ```

use crate::error::ProximityError;
use crate::stats::{AggregateResult, WorkerTally};
use std::collections::HashMap;

/// Tally collector for one worker group
#[derive(Debug)]
pub struct TallyAggregator {
    /// Expected group size
    worker_count: usize,

    /// Received tallies (worker_id → tally)
    workers: HashMap<usize, WorkerTally>,
}

impl TallyAggregator {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            workers: HashMap::with_capacity(worker_count),
        }
    }

    /// Add one worker's tally
    ///
    /// Rejects out-of-range and duplicate worker ids, and tallies whose band
    /// counts do not add up to their processed total.
    pub fn add_worker(&mut self, tally: WorkerTally) -> Result<(), ProximityError> {
        let worker_id = tally.worker_id;
        if worker_id >= self.worker_count {
            return Err(ProximityError::collective(format!(
                "tally from worker {} outside group of {}",
                worker_id, self.worker_count
            )));
        }
        if self.workers.contains_key(&worker_id) {
            return Err(ProximityError::collective(format!(
                "duplicate tally from worker {}",
                worker_id
            )));
        }
        if !tally.is_consistent() {
            return Err(ProximityError::collective(format!(
                "tally from worker {} is inconsistent: band counts {:?} vs total {}",
                worker_id, tally.band_counts, tally.total_processed
            )));
        }
        self.workers.insert(worker_id, tally);
        Ok(())
    }

    /// Number of tallies received so far
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether every worker of the group has contributed
    pub fn is_complete(&self) -> bool {
        self.workers.len() == self.worker_count
    }

    pub fn has_worker(&self, worker_id: usize) -> bool {
        self.workers.contains_key(&worker_id)
    }

    /// Ids of workers that have not contributed yet, ascending
    pub fn missing_workers(&self) -> Vec<usize> {
        (0..self.worker_count)
            .filter(|id| !self.workers.contains_key(id))
            .collect()
    }

    /// Sorted list of worker ids received so far
    pub fn worker_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.workers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Consume the aggregator into the ordered tallies and the global result
    ///
    /// Fails with `CollectiveFailure` unless every worker contributed: a
    /// partial aggregate is never produced.
    pub fn finish(mut self) -> Result<(Vec<WorkerTally>, AggregateResult), ProximityError> {
        if !self.is_complete() {
            return Err(ProximityError::collective(format!(
                "missing tallies from workers {:?}",
                self.missing_workers()
            )));
        }
        let per_worker: Vec<WorkerTally> = (0..self.worker_count)
            .filter_map(|id| self.workers.remove(&id))
            .collect();
        let aggregate = AggregateResult::from_tallies(&per_worker);
        Ok((per_worker, aggregate))
    }
}
