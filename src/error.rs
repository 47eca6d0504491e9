//! Error taxonomy
//!
//! Typed failure conditions for the classification pipeline. Application code
//! passes these around inside `anyhow::Error`; callers that need to react to a
//! specific condition recover it with `downcast_ref::<ProximityError>()`.
//!
//! A worker that owns no records is *not* an error: it reports a zero-filled
//! tally like any other worker.

use thiserror::Error;

/// Failure conditions raised by the pipeline
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProximityError {
    /// Input data cannot be classified (empty facility set, malformed record)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The gather did not complete because one or more workers never contributed
    #[error("collective failure: {0}")]
    CollectiveFailure(String),

    /// Worker identity does not fit the worker group
    #[error("invalid topology: worker {worker_id} of {worker_count}")]
    InvalidTopology {
        worker_id: usize,
        worker_count: usize,
    },

    /// Unexpected or incompatible frame on the gather transport
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ProximityError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn collective(msg: impl Into<String>) -> Self {
        Self::CollectiveFailure(msg.into())
    }

    /// Whether this error aborts the whole run rather than a single worker
    pub fn is_collective(&self) -> bool {
        matches!(self, Self::CollectiveFailure(_) | Self::Protocol(_))
    }
}

/// The failure that explains the others
///
/// When one worker fails, every other worker sees a collective failure.
/// Returns the first error that is not collective, or the first error when
/// all of them are.
pub fn root_cause(mut failures: Vec<anyhow::Error>) -> Option<anyhow::Error> {
    if failures.is_empty() {
        return None;
    }
    let pos = failures
        .iter()
        .position(|e| {
            !e.downcast_ref::<ProximityError>()
                .map_or(false, ProximityError::is_collective)
        })
        .unwrap_or(0);
    Some(failures.swap_remove(pos))
}
