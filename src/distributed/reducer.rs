//! Coordinator-side combine step
//!
//! [`ResultReducer`] runs the gather over any [`Collective`] and turns the
//! gathered tallies into a [`ProximityReport`]. Global percentages are
//! recomputed from the summed counts; per-worker percentages are never
//! averaged.

use super::collective::Collective;
use crate::error::ProximityError;
use crate::stats::aggregator::TallyAggregator;
use crate::stats::{AggregateResult, WorkerTally};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Complete result of a run, available on the coordinator only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityReport {
    pub worker_count: usize,

    /// Load + classify + reduce wall-clock time
    pub elapsed: Duration,

    /// One tally per worker, ordered by worker id
    pub per_worker: Vec<WorkerTally>,

    pub aggregate: AggregateResult,
}

impl ProximityReport {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Gathers tallies and builds the report
pub struct ResultReducer<C: Collective> {
    collective: C,
}

impl<C: Collective> ResultReducer<C> {
    pub fn new(collective: C) -> Self {
        Self { collective }
    }

    pub fn worker_id(&self) -> usize {
        self.collective.worker_id()
    }

    pub fn worker_count(&self) -> usize {
        self.collective.worker_count()
    }

    pub fn is_coordinator(&self) -> bool {
        self.collective.is_coordinator()
    }

    /// Contribute this worker's tally and, on the coordinator, combine
    ///
    /// `started` is when the run started on this worker; the report's elapsed
    /// time runs from there to the end of the gather.
    pub fn reduce(&mut self, tally: WorkerTally, started: Instant) -> Result<Option<ProximityReport>> {
        let worker_count = self.collective.worker_count();

        let gathered = match self.collective.gather(tally)? {
            Some(gathered) => gathered,
            None => return Ok(None),
        };
        let elapsed = started.elapsed();

        let (per_worker, aggregate) = combine(worker_count, gathered)?;

        tracing::info!(
            worker_count,
            total = aggregate.total_processed,
            elapsed_ms = elapsed.as_millis() as u64,
            "gather complete"
        );

        Ok(Some(ProximityReport {
            worker_count,
            elapsed,
            per_worker,
            aggregate,
        }))
    }

    /// Tell the rest of the group this worker will not contribute
    pub fn abort(&mut self, reason: &str) {
        self.collective.abort(reason);
    }
}

/// Combine a full set of tallies into per-worker rows and the aggregate
///
/// Fails unless exactly one consistent tally per worker id is present.
pub fn combine(
    worker_count: usize,
    tallies: Vec<WorkerTally>,
) -> std::result::Result<(Vec<WorkerTally>, AggregateResult), ProximityError> {
    let mut aggregator = TallyAggregator::new(worker_count);
    for tally in tallies {
        aggregator.add_worker(tally)?;
    }
    aggregator.finish()
}
