//! Shared helpers for the chatd integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use chat_protocol::ServerLine;
use chatd::config::ServerConfig;
use chatd::registry::{RegistryEvent, RegistryHandle};
use chatd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for an expected line
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long "nothing arrives" is observed for
pub const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// Maximum time to wait for the server to stop
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Test Server
// ============================================================================

/// Test server bound to an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: RegistryHandle,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Spawns a server with default settings.
    pub async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default()).await
    }

    /// Spawns a server with `config`, overriding only the bind address.
    pub async fn spawn_with(config: ServerConfig) -> Self {
        let config = config.with_bind("127.0.0.1:0").expect("loopback bind");
        let registry = chatd::registry::spawn_registry();
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(&config, registry.clone(), cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr();
        let task = tokio::spawn(server.run());

        Self {
            addr,
            registry,
            cancel_token,
            task,
        }
    }

    /// Opens a raw connection; nothing has been read yet.
    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        TestClient::new(stream)
    }

    /// Connects and completes name negotiation as `name`.
    ///
    /// Consumes `SUBMIT_NAME`, `NAME_ACCEPTED` and the client's own
    /// entered notice.
    pub async fn join(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.expect("SUBMIT_NAME").await;
        client.send(name).await;
        client.expect("NAME_ACCEPTED").await;
        client
            .expect(&format!("MESSAGE [{name} entered the room]"))
            .await;
        client
    }

    /// Subscribes to registry events.
    pub fn events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.subscribe()
    }

    /// Cancels the server and waits for every session to finish.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        timeout(SHUTDOWN_TIMEOUT, self.task)
            .await
            .expect("server stopped in time")
            .expect("server task completed");
    }
}

/// Waits until the registry releases `name`.
pub async fn wait_for_release(events: &mut broadcast::Receiver<RegistryEvent>, name: &str) {
    timeout(RECV_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(RegistryEvent::Released { name: released, .. }) if released.as_str() == name => {
                    return;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("registry closed"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{name} was not released in time"));
}

/// Polls until the registry holds no entries at all.
pub async fn wait_for_empty_registry(registry: &RegistryHandle) {
    timeout(RECV_TIMEOUT, async {
        while registry.count().await != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry drained in time");
}

// ============================================================================
// Test Client
// ============================================================================

/// Line-oriented test client.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Sends one line with a `\n` terminator.
    pub async fn send(&mut self, line: &str) {
        self.send_raw(format!("{line}\n").as_bytes()).await;
    }

    /// Sends raw bytes as-is.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
        self.writer.flush().await.expect("flush");
    }

    /// Receives the next line, or `None` at EOF.
    ///
    /// Every line must decode as a well-formed server line.
    pub async fn try_recv(&mut self) -> Option<String> {
        let line = match timeout(RECV_TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(line)) => line,
            // A reset after the server closes counts as EOF.
            Ok(Err(_)) => None,
            Err(_) => panic!("no line within {RECV_TIMEOUT:?}"),
        }?;
        if let Err(e) = ServerLine::parse(&line) {
            panic!("server sent malformed line {line:?}: {e}");
        }
        Some(line)
    }

    /// Receives and decodes the next line, failing at EOF.
    pub async fn recv_line(&mut self) -> ServerLine {
        let line = self.recv().await;
        ServerLine::parse(&line).expect("well-formed server line")
    }

    /// Receives the next line, failing at EOF.
    pub async fn recv(&mut self) -> String {
        self.try_recv().await.expect("line before EOF")
    }

    /// Asserts the next line equals `expected`.
    pub async fn expect(&mut self, expected: &str) {
        assert_eq!(self.recv().await, expected);
    }

    /// Asserts the server closes the connection next.
    pub async fn expect_eof(&mut self) {
        assert_eq!(self.try_recv().await, None);
    }

    /// Asserts nothing arrives within [`SILENCE_WINDOW`].
    pub async fn expect_silence(&mut self) {
        if let Ok(line) = timeout(SILENCE_WINDOW, self.lines.next_line()).await {
            panic!("expected silence, got {line:?}");
        }
    }

    /// Closes the write half, as a client hanging up would.
    pub async fn hang_up(&mut self) {
        self.writer.shutdown().await.expect("shutdown");
    }
}
