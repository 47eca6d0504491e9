//! Gather and combine
//!
//! Workers never share memory. The only interaction between them is one
//! gather at the end of a run, where every worker hands its tally to the
//! coordinator (worker 0).
//!
//! # Modules
//!
//! - `collective`: the [`Collective`] trait and the in-process transport
//! - `tcp`: multi-process transport over TCP
//! - `protocol`: TCP frame definitions and serialization
//! - `reducer`: coordinator-side combine into a [`ProximityReport`]

pub mod collective;
pub mod protocol;
pub mod reducer;
pub mod tcp;

pub use collective::{Collective, ThreadCollective, COORDINATOR_ID};
pub use protocol::{Message, PROTOCOL_VERSION};
pub use reducer::{ProximityReport, ResultReducer};
pub use tcp::{TcpCoordinator, TcpParticipant};
