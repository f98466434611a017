//! TCP server for the chat daemon.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a session task for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │     Session     │────▶│   Dispatcher    │──▶ other clients' queues
//! │   (per client)  │     │  + Registry     │
//! └───────┬─────────┘     └─────────────────┘
//!         │ own queue
//!         ▼
//! ┌─────────────────┐
//! │  Writer task    │──▶ socket
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the loop keeps going

mod session;

pub use session::{run_session, EndReason, LineOutcome, SessionEnd, SessionError, SessionLimits};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use chat_core::ClientId;

use crate::config::{ConfigError, ServerConfig};
use crate::dispatch::Dispatcher;
use crate::registry::RegistryHandle;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server for the chat daemon.
///
/// Owns the listening socket and the set of live session tasks.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Routing shared by every session
    dispatcher: Dispatcher,

    /// Per-session limits from config
    limits: SessionLimits,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,

    /// Live session tasks
    sessions: TaskTracker,
}

impl ChatServer {
    /// Validates `config` and binds the listening socket.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the configuration is invalid
    /// - `ServerError::Bind` if the address cannot be bound
    pub async fn bind(
        config: &ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.bind,
                error: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: config.bind,
            error: e.to_string(),
        })?;

        Ok(Self {
            listener,
            local_addr,
            dispatcher: Dispatcher::new(registry, config.overflow),
            limits: SessionLimits::from(config),
            cancel_token,
            connection_counter: AtomicU64::new(0),
            sessions: TaskTracker::new(),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the registry sessions claim names in.
    pub fn registry(&self) -> &RegistryHandle {
        self.dispatcher.registry()
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// waits for every session to finish its cleanup before returning.
    pub async fn run(self) {
        info!(addr = %self.local_addr, "Chat server listening");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
                            self.handle_connection(stream, peer, ClientId::new(conn_num));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        drop(self.listener);
        self.sessions.close();
        info!(sessions = self.sessions.len(), "Waiting for sessions to finish");
        self.sessions.wait().await;
        info!("Chat server stopped");
    }

    /// Spawns the session task for a new connection.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, client_id: ClientId) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(client_id = %client_id, error = %e, "Failed to set TCP_NODELAY");
        }

        info!(client_id = %client_id, peer = %peer, "Client connected");

        let (reader, writer) = stream.into_split();
        let dispatcher = self.dispatcher.clone();
        let limits = self.limits;
        let shutdown = self.cancel_token.clone();

        self.sessions.spawn(async move {
            run_session(client_id, reader, writer, dispatcher, limits, &shutdown).await
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
