//! Gather protocol
//!
//! Frames exchanged between the coordinator (worker 0) and every other worker
//! when the gather runs over TCP. Frames are MessagePack (rmp-serde) encoded.
//!
//! # Message Flow
//!
//! ```text
//! Worker k                         Coordinator (worker 0)
//!     |                                   |
//!     |---- TALLY(worker_id, tally) ----->|   (one per worker, any order)
//!     |                                   |
//!     |            ... all workers have contributed ...
//!     |                                   |
//!     |<----------- COMPLETE -------------|
//! ```
//!
//! A worker that fails before it has a tally sends `ERROR` instead of
//! `TALLY`. The coordinator then fails the whole gather and answers every
//! worker still connected with `ABORT`.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::stats::WorkerTally;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and workers must agree on it.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Worker → Coordinator: finalized tally
    Tally(TallyMessage),

    /// Worker → Coordinator: the worker failed before producing a tally
    Error(ErrorMessage),

    /// Coordinator → Worker: every tally arrived; the worker may finish
    Complete,

    /// Coordinator → Worker: the gather failed; no result will be produced
    Abort(AbortMessage),
}

/// Tally contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyMessage {
    pub protocol_version: u32,

    /// Sending host, for diagnostics
    pub node_id: String,

    /// Group size as seen by the sender
    pub worker_count: usize,

    pub tally: WorkerTally,
}

/// Worker failure report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub protocol_version: u32,
    pub node_id: String,
    pub worker_id: usize,
    pub error: String,
}

/// Gather failure notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortMessage {
    pub reason: String,
}

/// Serialize a message with its length prefix
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg).context("Failed to serialize message")?;

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Read one complete message from a stream
pub async fn read_message<R>(stream: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_FRAME_LEN {
        anyhow::bail!("Message too large: {} bytes (max {})", msg_len, MAX_FRAME_LEN);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    let msg = rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")?;

    Ok(msg)
}

/// Write one message to a stream and flush it
pub async fn write_message<W>(stream: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;

    stream.write_all(&framed).await.context("Failed to write message")?;
    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

/// Host identifier used in outgoing frames
pub fn node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
