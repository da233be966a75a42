//! One-shot chunk handoff between the primary and a worker process.
//!
//! The primary writes exactly one NDJSON line to the worker's stdin and
//! closes the pipe. The worker reads exactly one frame and ignores
//! anything after it.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::ipc::codec::NdjsonCodec;
use crate::models::account::AccountCredential;
use crate::{AppError, Result};

/// The single message a worker receives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMessage {
    /// Zero-based worker index.
    pub index: usize,
    /// Contiguous slice of the account list assigned to the worker.
    pub accounts: Vec<AccountCredential>,
}

/// Write `message` as one line and close the stream.
///
/// # Errors
///
/// Returns `AppError::Worker` if serialisation or the write fails (for
/// example when the worker died before reading its stdin).
pub async fn send_chunk<W>(writer: W, message: &ChunkMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = serde_json::to_string(message)
        .map_err(|err| AppError::Worker(format!("failed to encode chunk: {err}")))?;

    let mut framed = FramedWrite::new(writer, NdjsonCodec::new());
    framed
        .send(line)
        .await
        .map_err(|err| AppError::Worker(format!("failed to hand off chunk: {err}")))?;
    framed
        .close()
        .await
        .map_err(|err| AppError::Worker(format!("failed to close chunk stream: {err}")))
}

/// Block until the one chunk message arrives.
///
/// # Errors
///
/// Returns `AppError::Worker` if the stream closes before a complete line
/// arrives or the line is not a valid chunk message.
pub async fn receive_chunk<R>(reader: R) -> Result<ChunkMessage>
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, NdjsonCodec::new());

    let line = match framed.next().await {
        Some(Ok(line)) => line,
        Some(Err(err)) => {
            return Err(AppError::Worker(format!("failed to read chunk: {err}")));
        }
        None => {
            return Err(AppError::Worker(
                "chunk stream closed before a chunk arrived".into(),
            ));
        }
    };

    serde_json::from_str(&line)
        .map_err(|err| AppError::Worker(format!("malformed chunk message: {err}")))
}
