//! proxpulse - Nearest-facility proximity classifier
//!
//! proxpulse classifies residential coordinates by straight-line distance to
//! the nearest facility, buckets each residence into one of four proximity
//! bands, and reports per-worker and global counts and percentages.
//!
//! # Architecture
//!
//! - **Partitioning**: residence records are dealt round-robin to a fixed
//!   group of workers; each worker reads only the records it owns
//! - **Classification**: minimum Euclidean distance over the full facility set
//! - **Local tallies**: each worker counts bands for its own records
//! - **Gather**: the coordinator (worker 0) collects every tally, in-process
//!   over channels or across processes over TCP, and builds the report

pub mod classify;
pub mod config;
pub mod distributed;
pub mod error;
pub mod geo;
pub mod input;
pub mod output;
pub mod partition;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::ProximityError;
pub use worker::{Worker, WorkerOutcome, WorkerPhase};

/// Result type used throughout proxpulse
pub type Result<T> = anyhow::Result<T>;
