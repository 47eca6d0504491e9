//! Band tallies
//!
//! Per-worker counting of classified residences and the derived percentages.
//!
//! Each worker owns exactly one [`LocalAggregator`] for the duration of its
//! run. Once every owned residence is recorded the aggregator is finalized into
//! a [`WorkerTally`], which is the value shipped to the coordinator.
//!
//! # Example
//!
//! ```
//! use proxpulse::classify::Band;
//! use proxpulse::stats::LocalAggregator;
//!
//! let mut local = LocalAggregator::new(0);
//! local.record(Band::WithinOne);
//! local.record(Band::WithinOne);
//! local.record(Band::BeyondFive);
//! local.record(Band::TwoToFive);
//!
//! let tally = local.finalize();
//! assert_eq!(tally.total_processed, 4);
//! assert_eq!(tally.band_percentages, [50.0, 0.0, 25.0, 25.0]);
//! ```

pub mod aggregator;

use crate::classify::{Band, NUM_BANDS};
use serde::{Deserialize, Serialize};

/// Percentages of `total` for each band count
///
/// All zero when `total` is zero.
pub fn band_percentages(counts: &[u64; NUM_BANDS], total: u64) -> [f64; NUM_BANDS] {
    let mut out = [0.0; NUM_BANDS];
    if total == 0 {
        return out;
    }
    for (pct, &count) in out.iter_mut().zip(counts) {
        *pct = count as f64 / total as f64 * 100.0;
    }
    out
}

/// Finalized per-worker result
///
/// Field layout is fixed: this is the record exchanged at the gather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTally {
    pub worker_id: usize,
    pub total_processed: u64,
    pub band_counts: [u64; NUM_BANDS],
    pub band_percentages: [f64; NUM_BANDS],
}

impl WorkerTally {
    /// Zero-filled tally for a worker that processed nothing
    pub fn empty(worker_id: usize) -> Self {
        Self {
            worker_id,
            total_processed: 0,
            band_counts: [0; NUM_BANDS],
            band_percentages: [0.0; NUM_BANDS],
        }
    }

    pub fn count(&self, band: Band) -> u64 {
        self.band_counts[band.index()]
    }

    pub fn percentage(&self, band: Band) -> f64 {
        self.band_percentages[band.index()]
    }

    /// Check that the band counts add up to the processed total
    pub fn is_consistent(&self) -> bool {
        self.band_counts.iter().sum::<u64>() == self.total_processed
    }
}

/// Global result over every worker's tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total_processed: u64,
    pub band_counts: [u64; NUM_BANDS],
    pub band_percentages: [f64; NUM_BANDS],
}

impl AggregateResult {
    /// Sum the counts of `tallies` and recompute percentages on the summed total
    pub fn from_tallies<'a, I>(tallies: I) -> Self
    where
        I: IntoIterator<Item = &'a WorkerTally>,
    {
        let mut band_counts = [0u64; NUM_BANDS];
        let mut total_processed = 0u64;
        for tally in tallies {
            total_processed += tally.total_processed;
            for (sum, count) in band_counts.iter_mut().zip(&tally.band_counts) {
                *sum += count;
            }
        }
        Self {
            total_processed,
            band_percentages: band_percentages(&band_counts, total_processed),
            band_counts,
        }
    }

    pub fn count(&self, band: Band) -> u64 {
        self.band_counts[band.index()]
    }

    pub fn percentage(&self, band: Band) -> f64 {
        self.band_percentages[band.index()]
    }
}

/// Per-worker accumulator
///
/// Not shared: one worker records into it, then consumes it with
/// [`finalize`](Self::finalize).
#[derive(Debug, Clone)]
pub struct LocalAggregator {
    worker_id: usize,
    band_counts: [u64; NUM_BANDS],
    total_processed: u64,
}

impl LocalAggregator {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            band_counts: [0; NUM_BANDS],
            total_processed: 0,
        }
    }

    /// Count one residence in `band`
    #[inline]
    pub fn record(&mut self, band: Band) {
        self.band_counts[band.index()] += 1;
        self.total_processed += 1;
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed
    }

    pub fn count(&self, band: Band) -> u64 {
        self.band_counts[band.index()]
    }

    /// Compute percentages and produce the final tally
    pub fn finalize(self) -> WorkerTally {
        WorkerTally {
            worker_id: self.worker_id,
            total_processed: self.total_processed,
            band_counts: self.band_counts,
            band_percentages: band_percentages(&self.band_counts, self.total_processed),
        }
    }
}
