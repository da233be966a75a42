//! Request/response client for the automation host protocol.
//!
//! # Wire format
//!
//! One JSON object per line in each direction:
//!
//! ```json
//! {"id": "3f0c…", "method": "rewards/dashboard", "params": {"page_id": "p1"}}
//! {"id": "3f0c…", "result": {"userStatus": {"availablePoints": 1200}}}
//! {"id": "3f0c…", "error": {"message": "navigation timed out"}}
//! ```
//!
//! Requests are correlated by `id`, so the desktop and mobile workflows
//! of one account can share a host concurrently. Lines that are not a
//! response to a pending request are logged and skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ipc::codec::{is_framing_error, NdjsonCodec};
use crate::{AppError, Result};

/// Outbound queue depth before `call` starts waiting on the writer.
const OUTBOUND_CAPACITY: usize = 64;

/// Pending request senders keyed by request id.
type PendingRequests = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>>;

/// Response envelope (host → runner).
#[derive(Debug, Deserialize)]
struct HostResponse {
    id: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<HostErrorBody>,
}

#[derive(Debug, Deserialize)]
struct HostErrorBody {
    message: String,
}

/// Client end of a host connection.
///
/// Owns a reader task and a writer task; both stop when the client is
/// dropped.
#[derive(Debug)]
pub struct HostClient {
    outbound: mpsc::Sender<String>,
    pending: PendingRequests,
    request_timeout: Duration,
    /// Fired by the reader when the host's stdout closes.
    stream_closed: CancellationToken,
    /// Stops both background tasks.
    shutdown: CancellationToken,
}

impl Drop for HostClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl HostClient {
    /// Start the reader and writer tasks over an already-ready stream pair.
    #[must_use]
    pub fn start<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let pending: PendingRequests = Arc::default();
        let stream_closed = CancellationToken::new();
        let shutdown = CancellationToken::new();

        tokio::spawn(run_writer(writer, outbound_rx, shutdown.clone()));
        tokio::spawn(run_reader(
            reader,
            Arc::clone(&pending),
            stream_closed.clone(),
            shutdown.clone(),
        ));

        Self {
            outbound,
            pending,
            request_timeout,
            stream_closed,
            shutdown,
        }
    }

    /// Send `method` with `params` and decode the result as `T`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Host` when the host reports an error, the request
    /// times out, the host stream is closed, or the result does not decode.
    pub async fn call<T>(&self, method: &str, params: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if self.stream_closed.is_cancelled() {
            return Err(AppError::Host(format!("{method}: host stream closed")));
        }

        let id = Uuid::new_v4().to_string();
        let line = serde_json::to_string(&json!({
            "id": id,
            "method": method,
            "params": params,
        }))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.outbound.send(line).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(AppError::Host(format!("{method}: host writer stopped")));
        }

        let outcome = tokio::select! {
            biased;

            response = tokio::time::timeout(self.request_timeout, rx) => match response {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(AppError::Host(format!("{method}: response dropped"))),
                Err(_elapsed) => Err(AppError::Host(format!(
                    "{method}: no response within {:?}",
                    self.request_timeout
                ))),
            },
            () = self.stream_closed.cancelled() => {
                Err(AppError::Host(format!("{method}: host stream closed")))
            }
        };

        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                self.pending.lock().await.remove(&id);
                return Err(err);
            }
        };

        serde_json::from_value(value)
            .map_err(|err| AppError::Host(format!("{method}: unexpected result: {err}")))
    }

    /// Whether the host's stdout has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stream_closed.is_cancelled()
    }
}

async fn run_writer<W>(writer: W, mut rx: mpsc::Receiver<String>, shutdown: CancellationToken)
where
    W: AsyncWrite + Unpin,
{
    let mut framed = FramedWrite::new(writer, NdjsonCodec::new());

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                debug!("host writer: shutdown received, stopping");
                break;
            }

            line = rx.recv() => {
                let Some(line) = line else {
                    debug!("host writer: outbound channel closed, stopping");
                    break;
                };
                if let Err(err) = framed.send(line).await {
                    warn!(%err, "host writer: write failed, stopping");
                    break;
                }
            }
        }
    }
}

async fn run_reader<R>(
    reader: R,
    pending: PendingRequests,
    stream_closed: CancellationToken,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, NdjsonCodec::new());

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                debug!("host reader: shutdown received, stopping");
                break;
            }

            item = framed.next() => match item {
                None => {
                    debug!("host reader: EOF");
                    break;
                }
                Some(Err(ref err)) if is_framing_error(err) => {
                    warn!(%err, "host reader: framing error, skipping line");
                }
                Some(Err(err)) => {
                    warn!(%err, "host reader: stream error, stopping");
                    break;
                }
                Some(Ok(line)) => deliver(&pending, &line).await,
            },
        }
    }

    stream_closed.cancel();
    let orphaned: Vec<_> = pending.lock().await.drain().collect();
    for (_, tx) in orphaned {
        let _ = tx.send(Err(AppError::Host("host stream closed".into())));
    }
}

async fn deliver(pending: &PendingRequests, line: &str) {
    if line.trim().is_empty() {
        return;
    }

    let response: HostResponse = match serde_json::from_str(line) {
        Ok(response) => response,
        Err(err) => {
            warn!(%err, "host reader: malformed response, skipping");
            return;
        }
    };

    let Some(tx) = pending.lock().await.remove(&response.id) else {
        debug!(id = response.id, "host reader: response for unknown request");
        return;
    };

    let result = match (response.error, response.result) {
        (Some(error), _) => Err(AppError::Host(error.message)),
        (None, result) => Ok(result.unwrap_or(Value::Null)),
    };

    let _ = tx.send(result);
}
