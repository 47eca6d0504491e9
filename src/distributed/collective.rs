//! Collective gather
//!
//! The only point where workers interact. Every worker contributes exactly one
//! [`WorkerTally`]; the coordinator (worker [`COORDINATOR_ID`]) receives all of
//! them, ordered by worker id, and everyone else receives nothing.
//!
//! The gather is barrier-synchronous: no worker leaves it until the
//! coordinator holds every tally. When a worker fails before contributing, the
//! gather cannot complete and every participant gets a
//! [`ProximityError::CollectiveFailure`] instead of a partial result.
//!
//! Two transports implement [`Collective`]:
//!
//! - [`ThreadCollective`]: workers are threads of one process (crossbeam channels)
//! - [`TcpCoordinator`](super::tcp::TcpCoordinator) /
//!   [`TcpParticipant`](super::tcp::TcpParticipant): workers are processes

use crate::error::ProximityError;
use crate::stats::aggregator::TallyAggregator;
use crate::stats::WorkerTally;
use crate::Result;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Worker id of the coordinator
pub const COORDINATOR_ID: usize = 0;

/// One worker's endpoint of a gather
pub trait Collective: Send {
    fn worker_id(&self) -> usize;

    fn worker_count(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.worker_id() == COORDINATOR_ID
    }

    /// Contribute `tally` and wait until the gather completes
    ///
    /// Returns `Some(tallies)` ordered by worker id on the coordinator and
    /// `None` everywhere else.
    fn gather(&mut self, tally: WorkerTally) -> Result<Option<Vec<WorkerTally>>>;

    /// Report that this worker will never contribute
    ///
    /// Best effort: lets the coordinator fail fast instead of waiting.
    fn abort(&mut self, reason: &str);
}

/// What a worker hands to the coordinator
#[derive(Debug)]
enum Contribution {
    Tally(WorkerTally),
    Failed { worker_id: usize, reason: String },
}

/// Coordinator → worker release signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    Complete,
    Aborted,
}

/// In-process gather between worker threads
///
/// Build the whole group with [`ThreadCollective::group`] and move one
/// endpoint into each worker thread.
#[derive(Debug)]
pub struct ThreadCollective {
    worker_id: usize,
    worker_count: usize,
    timeout: Option<Duration>,
    role: Role,
}

#[derive(Debug)]
enum Role {
    Coordinator {
        contributions: Receiver<Contribution>,
        releases: Vec<Sender<Release>>,
    },
    Participant {
        contribute: Sender<Contribution>,
        release: Receiver<Release>,
    },
    /// Endpoint already used or aborted
    Spent,
}

impl ThreadCollective {
    /// Endpoints for a group of `worker_count` workers, indexed by worker id
    ///
    /// `timeout` bounds how long the coordinator waits for missing tallies;
    /// `None` waits until every worker either contributes or exits.
    pub fn group(worker_count: usize, timeout: Option<Duration>) -> Vec<ThreadCollective> {
        let (contribute, contributions) = channel::unbounded();
        let mut releases = Vec::with_capacity(worker_count.saturating_sub(1));
        let mut endpoints = Vec::with_capacity(worker_count);

        for worker_id in 1..worker_count {
            let (release_tx, release_rx) = channel::bounded(1);
            releases.push(release_tx);
            endpoints.push(ThreadCollective {
                worker_id,
                worker_count,
                timeout,
                role: Role::Participant {
                    contribute: contribute.clone(),
                    release: release_rx,
                },
            });
        }
        // Only participants keep senders, so the coordinator sees a
        // disconnect once every participant has gone.
        drop(contribute);

        if worker_count > 0 {
            endpoints.insert(
                0,
                ThreadCollective {
                    worker_id: COORDINATOR_ID,
                    worker_count,
                    timeout,
                    role: Role::Coordinator { contributions, releases },
                },
            );
        }
        endpoints
    }

    fn collect(
        &self,
        own: WorkerTally,
        contributions: &Receiver<Contribution>,
    ) -> std::result::Result<Vec<WorkerTally>, ProximityError> {
        let mut aggregator = TallyAggregator::new(self.worker_count);
        aggregator.add_worker(own)?;

        let deadline = self.timeout.and_then(|t| Instant::now().checked_add(t));

        while !aggregator.is_complete() {
            let received = match deadline {
                Some(deadline) => contributions.recv_deadline(deadline),
                None => contributions.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Contribution::Tally(tally)) => {
                    tracing::debug!(worker_id = tally.worker_id, "tally received");
                    aggregator.add_worker(tally)?;
                }
                Ok(Contribution::Failed { worker_id, reason }) => {
                    return Err(ProximityError::collective(format!(
                        "worker {} failed before the gather: {}",
                        worker_id, reason
                    )));
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ProximityError::collective(format!(
                        "timed out waiting for workers {:?}",
                        aggregator.missing_workers()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ProximityError::collective(format!(
                        "workers {:?} exited without contributing",
                        aggregator.missing_workers()
                    )));
                }
            }
        }

        let (per_worker, _) = aggregator.finish()?;
        Ok(per_worker)
    }
}

impl Collective for ThreadCollective {
    fn worker_id(&self) -> usize {
        self.worker_id
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn gather(&mut self, tally: WorkerTally) -> Result<Option<Vec<WorkerTally>>> {
        if tally.worker_id != self.worker_id {
            return Err(ProximityError::collective(format!(
                "worker {} contributed a tally labelled worker {}",
                self.worker_id, tally.worker_id
            ))
            .into());
        }

        match std::mem::replace(&mut self.role, Role::Spent) {
            Role::Coordinator { contributions, releases } => {
                let outcome = self.collect(tally, &contributions);
                let signal = if outcome.is_ok() { Release::Complete } else { Release::Aborted };
                for release in &releases {
                    // A participant that already exited has nothing to release
                    let _ = release.send(signal);
                }
                Ok(Some(outcome?))
            }
            Role::Participant { contribute, release } => {
                contribute.send(Contribution::Tally(tally)).map_err(|_| {
                    ProximityError::collective("coordinator exited before the gather")
                })?;
                drop(contribute);

                match release.recv() {
                    Ok(Release::Complete) => Ok(None),
                    Ok(Release::Aborted) => {
                        Err(ProximityError::collective("coordinator aborted the gather").into())
                    }
                    Err(_) => Err(ProximityError::collective("coordinator exited during the gather").into()),
                }
            }
            Role::Spent => Err(ProximityError::collective("gather endpoint already used").into()),
        }
    }

    fn abort(&mut self, reason: &str) {
        match std::mem::replace(&mut self.role, Role::Spent) {
            Role::Coordinator { releases, .. } => {
                for release in &releases {
                    let _ = release.send(Release::Aborted);
                }
            }
            Role::Participant { contribute, .. } => {
                let _ = contribute.send(Contribution::Failed {
                    worker_id: self.worker_id,
                    reason: reason.to_string(),
                });
            }
            Role::Spent => {}
        }
    }
}
