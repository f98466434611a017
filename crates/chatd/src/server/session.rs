//! Per-connection session: the client protocol state machine.
//!
//! Each accepted connection runs [`run_session`], which:
//! - Negotiates a unique screen name (`SUBMIT_NAME` until a claim succeeds)
//! - Registers the client's outbound queue and announces the arrival
//! - Decodes client lines into commands and routes them via the dispatcher
//! - Releases the name and closes the connection exactly once on exit
//!
//! ```text
//!  ┌─────────────┐  claim ok   ┌──────────┐  EOF / GOODBYE / error / kick  ┌────────────┐
//!  │ Negotiating │────────────▶│  Active  │───────────────────────────────▶│ Terminated │
//!  └──────┬──────┘             └──────────┘                                └────────────┘
//!         │ EOF / error                                                          ▲
//!         └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Transport errors end only this session

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chat_core::{ClientId, ScreenName};
use chat_protocol::{strip_line_ending, ClientCommand, ServerLine};

use crate::config::ServerConfig;
use crate::dispatch::{DeliveryReport, Dispatcher, PrivateOutcome};
use crate::outbound::{self, Outbound};
use crate::registry::{ClaimGuard, RegistryError};

/// Per-session limits, taken from [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Lines the client's outbound queue holds
    pub outbound_capacity: usize,
    /// Longest accepted line in bytes, terminator excluded
    pub max_line_length: usize,
    /// End the session after this long without a line (never if `None`)
    pub idle_timeout: Option<Duration>,
    /// Bound on each socket write and flush
    pub write_timeout: Duration,
}

impl From<&ServerConfig> for SessionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            outbound_capacity: config.outbound_capacity,
            max_line_length: config.max_line_length,
            idle_timeout: config.idle_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// What handling one line from an active client amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Chat text, broadcast to every active client
    Broadcast(DeliveryReport),
    /// `PM <target> <body>`
    Private(PrivateOutcome),
    /// `GET_USERS`, answered to the sender only
    Listed,
    /// `GOODBYE`
    Goodbye,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The client closed the connection.
    Disconnected,
    /// The client sent `GOODBYE`.
    Goodbye,
    /// The session was told to stop (slow consumer, failed writer, shutdown).
    Kicked,
    /// Nothing was read within the configured idle timeout.
    IdleTimeout,
    /// A transport or internal failure.
    Error(SessionError),
}

/// Summary returned when a session terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    /// Connection the session served
    pub client_id: ClientId,
    /// Name the client held, if negotiation completed
    pub name: Option<ScreenName>,
    /// Why the session ended
    pub reason: EndReason,
}

/// Errors that terminate a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Line too long (max: {max} bytes)")]
    LineTooLong { max: usize },

    #[error("Outbound queue closed")]
    OutboundClosed,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

enum SessionState {
    Negotiating,
    Active(ClaimGuard),
    Terminated(EndReason),
}

/// Runs one client session to completion.
///
/// `shutdown` is the server-wide token; the session derives its own kick
/// token from it, so server shutdown terminates every session. The writer
/// task is awaited before returning, so everything queued for the client
/// (up to the write timeout) has been flushed when this resolves.
pub async fn run_session<R, W>(
    client_id: ClientId,
    reader: R,
    writer: W,
    dispatcher: Dispatcher,
    limits: SessionLimits,
    shutdown: &CancellationToken,
) -> SessionEnd
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let kick = shutdown.child_token();
    let (outbound, queue) = outbound::channel(limits.outbound_capacity, kick.clone());
    let mut writer_task = outbound::spawn_writer(client_id, queue, writer, limits.write_timeout);

    debug!(client_id = %client_id, "Session started");

    let mut session = Session {
        client_id,
        reader: BufReader::new(reader),
        outbound,
        kick: kick.clone(),
        dispatcher,
        limits,
        name: None,
    };
    let reason = session.run().await;
    let name = session.name.take();

    // Dropping the session drops its outbound handle; the registry's handle
    // went away with the release, so the writer drains and exits.
    drop(session);
    if timeout(limits.write_timeout, &mut writer_task).await.is_err() {
        kick.cancel();
        let _ = writer_task.await;
    }

    match &reason {
        EndReason::Error(e) => warn!(client_id = %client_id, name = ?name, error = %e, "Session failed"),
        other => info!(client_id = %client_id, name = ?name, reason = ?other, "Session ended"),
    }

    SessionEnd {
        client_id,
        name,
        reason,
    }
}

/// Server-side state for one connected client.
struct Session<R> {
    client_id: ClientId,
    reader: BufReader<R>,
    outbound: Outbound,
    kick: CancellationToken,
    dispatcher: Dispatcher,
    limits: SessionLimits,
    name: Option<ScreenName>,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn run(&mut self) -> EndReason {
        let mut state = SessionState::Negotiating;
        loop {
            state = match state {
                SessionState::Negotiating => self.negotiate().await,
                SessionState::Active(guard) => self.converse(guard).await,
                SessionState::Terminated(reason) => return reason,
            };
        }
    }

    /// `SUBMIT_NAME` until a valid, unclaimed name comes back.
    async fn negotiate(&mut self) -> SessionState {
        loop {
            if let Err(e) = self.reply(&ServerLine::SubmitName).await {
                return SessionState::Terminated(EndReason::Error(e));
            }

            let candidate = match self.next_line().await {
                Ok(line) => line,
                Err(reason) => return SessionState::Terminated(reason),
            };

            let name = match ScreenName::parse(&candidate) {
                Ok(name) => name,
                Err(e) => {
                    debug!(client_id = %self.client_id, error = %e, "Invalid screen name");
                    continue;
                }
            };

            debug!(client_id = %self.client_id, name = %name, "Trying screen name");
            match ClaimGuard::acquire(self.dispatcher.registry(), name, self.client_id).await {
                Ok(Some(guard)) => {
                    self.name = Some(guard.name().clone());
                    return SessionState::Active(guard);
                }
                Ok(None) => continue,
                Err(e) => return SessionState::Terminated(EndReason::Error(e.into())),
            }
        }
    }

    /// Active phase: announce, then handle lines until the session ends.
    async fn converse(&mut self, guard: ClaimGuard) -> SessionState {
        let reason = match self.enter(&guard).await {
            Ok(()) => self.read_loop(guard.name()).await,
            Err(e) => EndReason::Error(e),
        };

        let name = guard.name().clone();
        guard.release().await;

        if reason == EndReason::Goodbye {
            self.dispatcher.broadcast(&ServerLine::left(&name)).await;
        }

        SessionState::Terminated(reason)
    }

    async fn enter(&self, guard: &ClaimGuard) -> Result<(), SessionError> {
        // NAME_ACCEPTED is queued before the name becomes routable, so it is
        // always the first thing the client sees after negotiation.
        self.reply(&ServerLine::NameAccepted).await?;

        if !guard.activate(self.outbound.clone()).await? {
            return Err(SessionError::Registry(RegistryError::ChannelClosed));
        }

        info!(client_id = %self.client_id, name = %guard.name(), "Name accepted");
        self.dispatcher
            .broadcast(&ServerLine::entered(guard.name()))
            .await;
        Ok(())
    }

    async fn read_loop(&mut self, name: &ScreenName) -> EndReason {
        loop {
            let line = match self.next_line().await {
                Ok(line) => line,
                Err(reason) => return reason,
            };

            match self.handle_line(name, &line).await {
                Ok(LineOutcome::Goodbye) => return EndReason::Goodbye,
                Ok(outcome) => {
                    debug!(client_id = %self.client_id, outcome = ?outcome, "Line handled");
                }
                Err(e) => return EndReason::Error(e),
            }
        }
    }

    /// Routes one line from an active client.
    async fn handle_line(&self, name: &ScreenName, line: &str) -> Result<LineOutcome, SessionError> {
        match ClientCommand::parse(line) {
            ClientCommand::Goodbye => Ok(LineOutcome::Goodbye),
            ClientCommand::Private { target, body } => {
                let outcome = self.dispatcher.send_private(name, &target, &body).await;
                Ok(LineOutcome::Private(outcome))
            }
            ClientCommand::ListUsers => {
                let roster = self.dispatcher.list_users().await;
                self.reply(&roster).await?;
                Ok(LineOutcome::Listed)
            }
            ClientCommand::Chat(body) => {
                let report = self
                    .dispatcher
                    .broadcast(&ServerLine::chat(name, body))
                    .await;
                Ok(LineOutcome::Broadcast(report))
            }
        }
    }

    /// Queues a line for this client only.
    async fn reply(&self, line: &ServerLine) -> Result<(), SessionError> {
        self.outbound
            .send(line)
            .await
            .map_err(|_| SessionError::OutboundClosed)
    }

    /// Reads the next line, honoring the kick token, idle timeout and length limit.
    async fn next_line(&mut self) -> Result<String, EndReason> {
        let idle_timeout = self.limits.idle_timeout;
        let read = read_bounded_line(&mut self.reader, self.limits.max_line_length);

        let timed = async move {
            match idle_timeout {
                Some(limit) => timeout(limit, read)
                    .await
                    .unwrap_or(Err(EndReason::IdleTimeout)),
                None => read.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.kick.cancelled() => Err(EndReason::Kicked),
            result = timed => result,
        }
    }
}

/// Reads one line of at most `max` bytes, excluding the line terminator.
///
/// EOF before any byte maps to [`EndReason::Disconnected`]. A final line
/// without a terminator is still returned. Invalid UTF-8 is replaced with
/// U+FFFD; the limit applies to the raw bytes.
async fn read_bounded_line<B>(reader: &mut B, max: usize) -> Result<String, EndReason>
where
    B: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    // Room for the longest accepted line plus "\r\n".
    let bytes_read = match reader.take(max as u64 + 2).read_until(b'\n', &mut buf).await {
        Ok(n) => n,
        Err(e) => return Err(EndReason::Error(SessionError::Io(e.to_string()))),
    };

    if bytes_read == 0 {
        return Err(EndReason::Disconnected);
    }

    let line = strip_line_ending(&buf);
    if line.len() > max {
        return Err(EndReason::Error(SessionError::LineTooLong { max }));
    }
    Ok(String::from_utf8_lossy(line).into_owned())
}
