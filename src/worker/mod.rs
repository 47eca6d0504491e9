//! Worker pipeline
//!
//! A [`Worker`] is one member of the group. It loads the facility set, opens
//! its residence source, classifies every record its partition owns, and then
//! takes part in the gather. Workers share nothing; each owns its classifier,
//! reader and tally.
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Loading → Classifying → LocalDone → Reducing → Reported (coordinator)
//!                                                     → Done     (others)
//! ```
//!
//! Any error moves the worker to `Failed`. A worker that fails before the
//! gather tells the collective it will not contribute, so the coordinator can
//! fail the run instead of waiting.
//!
//! # Example
//!
//! ```no_run
//! use proxpulse::distributed::ThreadCollective;
//! use proxpulse::input::{load_facilities, FixedWidthRecordFile};
//! use proxpulse::worker::{Worker, WorkerOutcome};
//! use std::path::Path;
//!
//! let endpoint = ThreadCollective::group(1, None).remove(0);
//! let mut worker = Worker::new(endpoint);
//!
//! let outcome = worker.run(
//!     || load_facilities(Path::new("facilities.dat")),
//!     || FixedWidthRecordFile::open(Path::new("residences.dat"), None),
//! )?;
//!
//! if let WorkerOutcome::Reported(report) = outcome {
//!     println!("{} residences classified", report.aggregate.total_processed);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::classify::NearestBandClassifier;
use crate::distributed::{Collective, ProximityReport, ResultReducer};
use crate::geo::FacilitySet;
use crate::input::RecordSource;
use crate::partition::RecordPartitioner;
use crate::stats::LocalAggregator;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Where a worker is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerPhase {
    Idle,
    Loading,
    Classifying,
    LocalDone,
    Reducing,
    Reported,
    Done,
    Failed,
}

impl WorkerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerPhase::Reported | WorkerPhase::Done | WorkerPhase::Failed)
    }

    /// Whether `next` directly follows `self`
    pub fn can_advance_to(self, next: WorkerPhase) -> bool {
        use WorkerPhase::*;
        match (self, next) {
            (Idle, Loading)
            | (Loading, Classifying)
            | (Classifying, LocalDone)
            | (LocalDone, Reducing)
            | (Reducing, Reported)
            | (Reducing, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::Loading => "loading",
            WorkerPhase::Classifying => "classifying",
            WorkerPhase::LocalDone => "local-done",
            WorkerPhase::Reducing => "reducing",
            WorkerPhase::Reported => "reported",
            WorkerPhase::Done => "done",
            WorkerPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a successful run ended
#[derive(Debug)]
pub enum WorkerOutcome {
    /// Coordinator: the combined report
    Reported(ProximityReport),
    /// Non-coordinator: tally delivered
    Done,
}

/// One member of the worker group
pub struct Worker<C: Collective> {
    worker_id: usize,
    worker_count: usize,
    phase: WorkerPhase,
    history: Vec<WorkerPhase>,
    reducer: ResultReducer<C>,
    started: Option<Instant>,
}

impl<C: Collective> Worker<C> {
    pub fn new(collective: C) -> Self {
        Self {
            worker_id: collective.worker_id(),
            worker_count: collective.worker_count(),
            phase: WorkerPhase::Idle,
            history: vec![WorkerPhase::Idle],
            reducer: ResultReducer::new(collective),
            started: None,
        }
    }

    /// Measure elapsed time from `started` instead of from `run`
    ///
    /// Used when the whole group shares one start instant.
    pub fn with_start(collective: C, started: Instant) -> Self {
        let mut worker = Self::new(collective);
        worker.started = Some(started);
        worker
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Every phase entered so far, in order
    pub fn history(&self) -> &[WorkerPhase] {
        &self.history
    }

    /// Run the whole pipeline
    ///
    /// `load_facilities` and `open_records` run in the `Loading` phase so that
    /// load failures are reported to the group like any other failure.
    pub fn run<L, O, S>(&mut self, load_facilities: L, open_records: O) -> Result<WorkerOutcome>
    where
        L: FnOnce() -> Result<FacilitySet>,
        O: FnOnce() -> Result<S>,
        S: RecordSource,
    {
        if self.phase != WorkerPhase::Idle {
            anyhow::bail!("worker {} already ran (phase {})", self.worker_id, self.phase);
        }

        let started = self.started.unwrap_or_else(Instant::now);

        match self.execute(load_facilities, open_records, started) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let gathered = self.phase == WorkerPhase::Reducing;
                self.fail();
                if !gathered {
                    self.reducer.abort(&format!("{:#}", e));
                }
                tracing::warn!(worker_id = self.worker_id, error = %format!("{:#}", e), "worker failed");
                Err(e)
            }
        }
    }

    fn execute<L, O, S>(&mut self, load_facilities: L, open_records: O, started: Instant) -> Result<WorkerOutcome>
    where
        L: FnOnce() -> Result<FacilitySet>,
        O: FnOnce() -> Result<S>,
        S: RecordSource,
    {
        self.advance(WorkerPhase::Loading)?;
        let facilities = load_facilities()?;
        let classifier = NearestBandClassifier::new(&facilities)?;
        let mut records = open_records()?;
        let partition = RecordPartitioner::new(records.record_count(), self.worker_id, self.worker_count)?;

        tracing::debug!(
            worker_id = self.worker_id,
            facilities = facilities.len(),
            records = records.record_count(),
            owned = partition.owned_count(),
            "inputs loaded"
        );

        self.advance(WorkerPhase::Classifying)?;
        let mut local = LocalAggregator::new(self.worker_id);
        for index in partition.indices() {
            let residence = records.record_at(index)?;
            local.record(classifier.classify(&residence.point));
        }

        self.advance(WorkerPhase::LocalDone)?;
        let tally = local.finalize();
        tracing::debug!(
            worker_id = self.worker_id,
            total = tally.total_processed,
            counts = ?tally.band_counts,
            "local tally finalized"
        );

        self.advance(WorkerPhase::Reducing)?;
        match self.reducer.reduce(tally, started)? {
            Some(report) => {
                self.advance(WorkerPhase::Reported)?;
                Ok(WorkerOutcome::Reported(report))
            }
            None => {
                self.advance(WorkerPhase::Done)?;
                Ok(WorkerOutcome::Done)
            }
        }
    }

    fn advance(&mut self, next: WorkerPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            anyhow::bail!(
                "worker {}: invalid phase transition {} -> {}",
                self.worker_id,
                self.phase,
                next
            );
        }
        tracing::debug!(worker_id = self.worker_id, from = %self.phase, phase = %next, "phase");
        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = WorkerPhase::Failed;
            self.history.push(WorkerPhase::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Band;
    use crate::distributed::ThreadCollective;
    use crate::error::ProximityError;
    use crate::geo::Point;
    use crate::input::InMemoryRecords;
    use std::thread;

    fn facilities() -> Result<FacilitySet> {
        Ok(FacilitySet::new(vec![Point::new(0.0, 0.0)]))
    }

    fn one_per_band() -> Result<InMemoryRecords> {
        Ok(InMemoryRecords::new(vec![
            Point::new(500.0, 0.0),
            Point::new(1500.0, 0.0),
            Point::new(3000.0, 4000.0),
            Point::new(10000.0, 0.0),
        ]))
    }

    fn single_worker() -> Worker<ThreadCollective> {
        Worker::new(ThreadCollective::group(1, None).remove(0))
    }

    #[test]
    fn test_one_residence_per_band() {
        let mut worker = single_worker();

        let report = match worker.run(facilities, one_per_band).unwrap() {
            WorkerOutcome::Reported(report) => report,
            WorkerOutcome::Done => panic!("coordinator must report"),
        };

        assert_eq!(report.aggregate.total_processed, 4);
        for band in Band::ALL {
            assert_eq!(report.aggregate.count(band), 1);
            assert_eq!(report.aggregate.percentage(band), 25.0);
        }
        assert_eq!(report.per_worker.len(), 1);
        assert_eq!(worker.phase(), WorkerPhase::Reported);
    }

    #[test]
    fn test_phase_history() {
        let mut worker = single_worker();
        worker.run(facilities, one_per_band).unwrap();

        use WorkerPhase::*;
        assert_eq!(
            worker.history(),
            &[Idle, Loading, Classifying, LocalDone, Reducing, Reported]
        );
    }

    #[test]
    fn test_two_workers_five_records() {
        let records = || -> Result<InMemoryRecords> {
            Ok(InMemoryRecords::new(
                (0..5).map(|i| Point::new(i as f64 * 1000.0 + 500.0, 0.0)).collect(),
            ))
        };

        let mut group = ThreadCollective::group(2, None).into_iter();
        let mut coordinator = Worker::new(group.next().unwrap());
        let mut other = Worker::new(group.next().unwrap());

        let handle = thread::spawn(move || {
            let outcome = other.run(facilities, records);
            (outcome.map(|o| matches!(o, WorkerOutcome::Done)), other.phase())
        });

        let report = match coordinator.run(facilities, records).unwrap() {
            WorkerOutcome::Reported(report) => report,
            WorkerOutcome::Done => panic!("coordinator must report"),
        };

        let (done, phase) = handle.join().unwrap();
        assert!(done.unwrap());
        assert_eq!(phase, WorkerPhase::Done);

        // Worker 0 owns {0, 2, 4}: 0.5 km, 2.5 km, 4.5 km
        assert_eq!(report.per_worker[0].total_processed, 3);
        assert_eq!(report.per_worker[0].count(Band::WithinOne), 1);
        assert_eq!(report.per_worker[0].count(Band::TwoToFive), 2);
        // Worker 1 owns {1, 3}: 1.5 km, 3.5 km
        assert_eq!(report.per_worker[1].total_processed, 2);
        assert_eq!(report.per_worker[1].count(Band::OneToTwo), 1);
        assert_eq!(report.per_worker[1].count(Band::TwoToFive), 1);

        assert_eq!(report.aggregate.total_processed, 5);
        assert_eq!(report.aggregate.band_counts, [1, 1, 3, 0]);
        assert_eq!(report.aggregate.percentage(Band::TwoToFive), 60.0);
    }

    #[test]
    fn test_worker_without_records_reports_zero() {
        let mut group = ThreadCollective::group(3, None).into_iter();
        let mut coordinator = Worker::new(group.next().unwrap());
        let handles: Vec<_> = group
            .map(|endpoint| {
                thread::spawn(move || {
                    let mut worker = Worker::new(endpoint);
                    worker.run(facilities, || Ok(InMemoryRecords::new(vec![Point::new(0.0, 0.0)])))
                })
            })
            .collect();

        let outcome = coordinator
            .run(facilities, || Ok(InMemoryRecords::new(vec![Point::new(0.0, 0.0)])))
            .unwrap();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let WorkerOutcome::Reported(report) = outcome else {
            panic!("coordinator must report");
        };
        assert_eq!(report.per_worker[2].total_processed, 0);
        assert_eq!(report.per_worker[2].band_percentages, [0.0; 4]);
        assert_eq!(report.aggregate.total_processed, 1);
    }

    #[test]
    fn test_empty_facility_set_fails_the_group() {
        let mut group = ThreadCollective::group(2, None).into_iter();
        let mut coordinator = Worker::new(group.next().unwrap());
        let mut broken = Worker::new(group.next().unwrap());

        let handle = thread::spawn(move || {
            let err = broken
                .run(|| Ok(FacilitySet::default()), one_per_band)
                .unwrap_err();
            (err, broken.phase(), broken.history().to_vec())
        });

        let err = coordinator.run(facilities, one_per_band).unwrap_err();
        assert!(err.downcast_ref::<ProximityError>().unwrap().is_collective());
        assert_eq!(coordinator.phase(), WorkerPhase::Failed);

        let (err, phase, history) = handle.join().unwrap();
        assert!(matches!(
            err.downcast_ref::<ProximityError>(),
            Some(ProximityError::InvalidInput(_))
        ));
        assert_eq!(phase, WorkerPhase::Failed);
        assert_eq!(history, vec![WorkerPhase::Idle, WorkerPhase::Loading, WorkerPhase::Failed]);
    }

    #[test]
    fn test_run_twice_rejected() {
        let mut worker = single_worker();
        worker.run(facilities, one_per_band).unwrap();
        assert!(worker.run(facilities, one_per_band).is_err());
        assert_eq!(worker.phase(), WorkerPhase::Reported);
    }

    #[test]
    fn test_phase_transitions() {
        use WorkerPhase::*;
        assert!(Idle.can_advance_to(Loading));
        assert!(Reducing.can_advance_to(Done));
        assert!(Classifying.can_advance_to(Failed));
        assert!(!Idle.can_advance_to(Classifying));
        assert!(!LocalDone.can_advance_to(Reported));
        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Loading));
    }
}
