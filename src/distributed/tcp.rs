//! TCP gather for multi-process runs
//!
//! The coordinator process binds a listener *before* it starts loading, so
//! workers that finish early can connect right away. Each participant opens
//! one connection at gather time, sends its `TALLY` frame and waits for the
//! coordinator's `COMPLETE` (or `ABORT`).
//!
//! The worker pipeline is synchronous; each endpoint owns a small tokio
//! runtime and drives the async socket code with `block_on`.

use super::collective::{Collective, COORDINATOR_ID};
use super::protocol::*;
use crate::error::ProximityError;
use crate::stats::aggregator::TallyAggregator;
use crate::stats::WorkerTally;
use crate::Result;
use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::task::JoinSet;
use tokio::time::sleep;

/// Delay between connection attempts while the coordinator is not listening
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(200);

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

/// Coordinator side of the TCP gather (worker 0)
pub struct TcpCoordinator {
    runtime: Runtime,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    worker_count: usize,
    timeout: Option<Duration>,
}

impl TcpCoordinator {
    /// Bind the gather listener
    ///
    /// `addr` is typically `0.0.0.0:<port>`; port 0 picks a free port (see
    /// [`local_addr`](Self::local_addr)).
    pub fn bind(addr: &str, worker_count: usize, timeout: Option<Duration>) -> Result<Self> {
        if worker_count == 0 {
            return Err(ProximityError::InvalidTopology { worker_id: COORDINATOR_ID, worker_count }.into());
        }

        let runtime = build_runtime()?;
        let listener = runtime
            .block_on(TcpListener::bind(addr))
            .with_context(|| format!("Failed to bind gather listener on {}", addr))?;
        let local_addr = listener.local_addr().context("Failed to read listener address")?;

        tracing::info!(%local_addr, worker_count, "gather listener ready");

        Ok(Self {
            runtime,
            listener: Some(listener),
            local_addr,
            worker_count,
            timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Collective for TcpCoordinator {
    fn worker_id(&self) -> usize {
        COORDINATOR_ID
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn gather(&mut self, tally: WorkerTally) -> Result<Option<Vec<WorkerTally>>> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| ProximityError::collective("gather endpoint already used"))?;

        let worker_count = self.worker_count;
        let timeout = self.timeout;

        let gathered = self.runtime.block_on(async move {
            let mut connections: Vec<(SocketAddr, TcpStream)> = Vec::new();

            let collected = match timeout {
                Some(limit) => match tokio::time::timeout(
                    limit,
                    collect_tallies(&listener, worker_count, tally, &mut connections),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProximityError::collective(format!(
                        "timed out after {:?} waiting for worker tallies",
                        limit
                    ))
                    .into()),
                },
                None => collect_tallies(&listener, worker_count, tally, &mut connections).await,
            };

            let reply = match &collected {
                Ok(_) => Message::Complete,
                Err(e) => Message::Abort(AbortMessage { reason: format!("{:#}", e) }),
            };
            for (addr, stream) in &mut connections {
                if let Err(e) = write_message(stream, &reply).await {
                    tracing::warn!(%addr, error = %e, "failed to release worker");
                }
            }

            collected
        })?;

        Ok(Some(gathered))
    }

    fn abort(&mut self, reason: &str) {
        // Closing the listener makes every participant's connection attempt
        // or pending read fail.
        tracing::warn!(reason, "coordinator aborting gather");
        self.listener.take();
    }
}

/// Accept connections until every worker has contributed
async fn collect_tallies(
    listener: &TcpListener,
    worker_count: usize,
    own: WorkerTally,
    connections: &mut Vec<(SocketAddr, TcpStream)>,
) -> Result<Vec<WorkerTally>> {
    let mut aggregator = TallyAggregator::new(worker_count);
    aggregator.add_worker(own)?;

    let mut pending = JoinSet::new();

    while !aggregator.is_complete() {
        tokio::select! {
            accepted = listener.accept() => {
                let (mut stream, addr) = accepted.context("Failed to accept worker connection")?;
                tracing::debug!(%addr, "worker connected");
                pending.spawn(async move {
                    let msg = read_message(&mut stream).await;
                    (addr, stream, msg)
                });
            }
            Some(joined) = pending.join_next() => {
                let (addr, stream, msg) = joined.context("Worker connection task failed")?;
                connections.push((addr, stream));

                let msg = msg.map_err(|e| {
                    ProximityError::collective(format!("worker at {} disconnected before contributing: {:#}", addr, e))
                })?;

                match msg {
                    Message::Tally(t) => {
                        if t.protocol_version != PROTOCOL_VERSION {
                            return Err(ProximityError::Protocol(format!(
                                "worker at {} speaks protocol {}, expected {}",
                                addr, t.protocol_version, PROTOCOL_VERSION
                            )).into());
                        }
                        if t.worker_count != worker_count {
                            return Err(ProximityError::Protocol(format!(
                                "worker {} at {} expects {} workers, coordinator has {}",
                                t.tally.worker_id, addr, t.worker_count, worker_count
                            )).into());
                        }
                        tracing::debug!(worker_id = t.tally.worker_id, node = %t.node_id, "tally received");
                        aggregator.add_worker(t.tally)?;
                    }
                    Message::Error(err) => {
                        return Err(ProximityError::collective(format!(
                            "worker {} on {} failed before the gather: {}",
                            err.worker_id, err.node_id, err.error
                        )).into());
                    }
                    other => {
                        return Err(ProximityError::Protocol(format!(
                            "unexpected message from {}: {:?}", addr, other
                        )).into());
                    }
                }
            }
        }
    }

    let (per_worker, _) = aggregator.finish()?;
    Ok(per_worker)
}

/// Participant side of the TCP gather (workers 1..N)
pub struct TcpParticipant {
    runtime: Runtime,
    worker_id: usize,
    worker_count: usize,
    coordinator: String,
    timeout: Option<Duration>,
    connect_attempts: u32,
    spent: bool,
}

impl TcpParticipant {
    pub fn new(
        worker_id: usize,
        worker_count: usize,
        coordinator: impl Into<String>,
        timeout: Option<Duration>,
        connect_attempts: u32,
    ) -> Result<Self> {
        if worker_id == COORDINATOR_ID || worker_id >= worker_count {
            return Err(ProximityError::InvalidTopology { worker_id, worker_count }.into());
        }
        Ok(Self {
            runtime: build_runtime()?,
            worker_id,
            worker_count,
            coordinator: coordinator.into(),
            timeout,
            connect_attempts: connect_attempts.max(1),
            spent: false,
        })
    }

    fn send(&self, msg: Message) -> Result<Option<Message>> {
        self.runtime.block_on(exchange(
            &self.coordinator,
            self.connect_attempts,
            self.timeout,
            msg,
        ))
    }
}

/// Send one frame to the coordinator; wait for the release after a tally
async fn exchange(
    coordinator: &str,
    attempts: u32,
    timeout: Option<Duration>,
    msg: Message,
) -> Result<Option<Message>> {
    let mut stream = connect_with_retry(coordinator, attempts).await?;
    write_message(&mut stream, &msg)
        .await
        .with_context(|| format!("Failed to send to coordinator at {}", coordinator))?;

    if !matches!(msg, Message::Tally(_)) {
        return Ok(None);
    }

    let reply = match timeout {
        Some(limit) => tokio::time::timeout(limit, read_message(&mut stream))
            .await
            .map_err(|_| ProximityError::collective("timed out waiting for the coordinator"))?,
        None => read_message(&mut stream).await,
    };
    let reply = reply.map_err(|e| {
        ProximityError::collective(format!("coordinator closed the gather: {:#}", e))
    })?;
    Ok(Some(reply))
}

async fn connect_with_retry(addr: &str, attempts: u32) -> Result<TcpStream> {
    let mut last_err = None;
    for attempt in 1..=attempts {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(addr, attempt, error = %e, "coordinator not reachable yet");
                last_err = Some(e);
                sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
    Err(ProximityError::collective(format!(
        "could not reach coordinator at {} after {} attempts: {}",
        addr,
        attempts,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
    .into())
}

impl Collective for TcpParticipant {
    fn worker_id(&self) -> usize {
        self.worker_id
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn gather(&mut self, tally: WorkerTally) -> Result<Option<Vec<WorkerTally>>> {
        if self.spent {
            return Err(ProximityError::collective("gather endpoint already used").into());
        }
        self.spent = true;

        if tally.worker_id != self.worker_id {
            return Err(ProximityError::collective(format!(
                "worker {} contributed a tally labelled worker {}",
                self.worker_id, tally.worker_id
            ))
            .into());
        }

        let msg = Message::Tally(TallyMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: node_id(),
            worker_count: self.worker_count,
            tally,
        });

        match self.send(msg)? {
            Some(Message::Complete) => Ok(None),
            Some(Message::Abort(abort)) => Err(ProximityError::collective(format!(
                "coordinator aborted the gather: {}",
                abort.reason
            ))
            .into()),
            other => Err(ProximityError::Protocol(format!(
                "unexpected reply from coordinator: {:?}",
                other
            ))
            .into()),
        }
    }

    fn abort(&mut self, reason: &str) {
        if self.spent {
            return;
        }
        self.spent = true;

        let msg = Message::Error(ErrorMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: node_id(),
            worker_id: self.worker_id,
            error: reason.to_string(),
        });
        if let Err(e) = self.send(msg) {
            tracing::warn!(worker_id = self.worker_id, error = %e, "could not report failure to coordinator");
        }
    }
}
