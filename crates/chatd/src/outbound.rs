//! Per-client outbound queues.
//!
//! Every connected client owns one bounded queue of rendered lines and one
//! writer task that drains it onto the socket. Everything that talks *to* a
//! client - its own session replying, other sessions broadcasting - only ever
//! enqueues. A peer that stops reading stalls nothing but its own writer.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Write failures end the writer task and cancel the client's kick token

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chat_core::ClientId;
use chat_protocol::ServerLine;

use crate::config::MAX_OUTBOUND_CAPACITY;

/// Most lines written between two flushes.
const MAX_BATCH_LINES: usize = 64;

/// A rendered protocol line, without its terminating newline.
///
/// Broadcasts render once and share the allocation across recipients.
pub type Line = Arc<str>;

/// Renders a server line for enqueueing.
pub fn render(line: &ServerLine) -> Line {
    Arc::from(line.to_string())
}

/// Why a line could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    Full,

    #[error("outbound queue is closed")]
    Closed,
}

/// Sending side of a client's outbound queue.
///
/// Cheap to clone. The owning session keeps one clone for its own replies;
/// the registry keeps another for routing broadcasts and private messages.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::Sender<Line>,
    kick: CancellationToken,
}

/// Receiving side of a client's outbound queue, owned by the writer task.
#[derive(Debug)]
pub struct OutboundReceiver {
    receiver: mpsc::Receiver<Line>,
    kick: CancellationToken,
}

/// Creates a bounded outbound queue.
///
/// `capacity` is clamped to `1..=MAX_OUTBOUND_CAPACITY`. `kick` is the
/// client's termination token: cancelling it makes the session end and the
/// writer stop. The writer cancels it itself when the socket fails.
pub fn channel(capacity: usize, kick: CancellationToken) -> (Outbound, OutboundReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.clamp(1, MAX_OUTBOUND_CAPACITY));
    (
        Outbound {
            sender,
            kick: kick.clone(),
        },
        OutboundReceiver { receiver, kick },
    )
}

impl Outbound {
    /// Enqueues a line without waiting.
    ///
    /// Used for every delivery that originates from another client, so a full
    /// queue is reported instead of blocking the sender.
    pub fn try_deliver(&self, line: Line) -> Result<(), DeliveryError> {
        self.sender.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Enqueues a line, waiting for queue space.
    ///
    /// Only the owning session uses this, for replies to its own client.
    pub async fn send(&self, line: &ServerLine) -> Result<(), DeliveryError> {
        self.sender
            .send(render(line))
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Asks the owning session to terminate.
    pub fn kick(&self) {
        self.kick.cancel();
    }

    /// Returns true once the client has been kicked.
    pub fn is_kicked(&self) -> bool {
        self.kick.is_cancelled()
    }

    /// Returns true if the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Returns true if both handles feed the same queue.
    pub fn same_queue(&self, other: &Outbound) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

impl OutboundReceiver {
    /// Receives the next queued line.
    ///
    /// Returns `None` once every [`Outbound`] handle has been dropped and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<Line> {
        self.receiver.recv().await
    }

    /// Receives a queued line if one is immediately available.
    pub fn try_recv(&mut self) -> Option<Line> {
        self.receiver.try_recv().ok()
    }
}

/// Spawns the writer task that drains `queue` onto `writer`.
///
/// The task ends when every sender is gone and the queue is empty (normal
/// termination), when the client is kicked (pending lines are discarded), or
/// when a write fails (the client is kicked so its session notices).
///
/// `write_timeout` bounds each buffered write and each flush separately, so a
/// peer that keeps reading is never dropped just because its queue stays busy.
/// The transport's write half is shut down on exit.
pub fn spawn_writer<W>(
    client_id: ClientId,
    mut queue: OutboundReceiver,
    writer: W,
    write_timeout: Duration,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        let kick = queue.kick.clone();

        loop {
            let first = tokio::select! {
                biased;
                _ = kick.cancelled() => {
                    debug!(client_id = %client_id, "Writer stopping: client kicked");
                    break;
                }
                line = queue.recv() => match line {
                    Some(line) => line,
                    None => {
                        debug!(client_id = %client_id, "Writer stopping: queue closed");
                        break;
                    }
                },
            };

            let written = tokio::select! {
                biased;
                _ = kick.cancelled() => {
                    debug!(client_id = %client_id, "Writer stopping: client kicked mid-write");
                    break;
                }
                result = write_batch(&mut writer, first, &mut queue, write_timeout) => result,
            };

            match written {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    warn!(
                        client_id = %client_id,
                        timeout_ms = write_timeout.as_millis() as u64,
                        "Write timed out, disconnecting client"
                    );
                    kick.cancel();
                    break;
                }
                Err(e) => {
                    debug!(client_id = %client_id, error = %e, "Write failed");
                    kick.cancel();
                    break;
                }
            }
        }

        if kick.is_cancelled() {
            // Buffered bytes are abandoned; only close the transport.
            let _ = writer.get_mut().shutdown().await;
        } else {
            let _ = timeout(write_timeout, writer.shutdown()).await;
        }
    })
}

/// Writes `first` plus up to [`MAX_BATCH_LINES`] already queued lines, then
/// flushes once.
async fn write_batch<W>(
    writer: &mut BufWriter<W>,
    first: Line,
    queue: &mut OutboundReceiver,
    limit: Duration,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_line(writer, &first, limit).await?;
    for _ in 1..MAX_BATCH_LINES {
        let Some(next) = queue.try_recv() else { break };
        write_line(writer, &next, limit).await?;
    }
    bounded(limit, writer.flush()).await
}

async fn write_line<W>(writer: &mut BufWriter<W>, line: &str, limit: Duration) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    bounded(limit, async {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await
    })
    .await
}

/// Runs one socket operation, mapping an elapsed `limit` to `TimedOut`.
async fn bounded<F>(limit: Duration, op: F) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    timeout(limit, op)
        .await
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")))
}
