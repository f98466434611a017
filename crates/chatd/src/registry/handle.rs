//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to registry events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed` or an empty result

use std::collections::BTreeSet;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use chat_core::{ClientId, ScreenName};

use super::commands::{RegistryCommand, RegistryError, RegistryEvent};
use crate::outbound::Outbound;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that is constructed once at startup and
/// passed to every session. All query methods are async and communicate with
/// the actor via channels.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<RegistryEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<RegistryEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Atomically reserve `name` for `owner`.
    ///
    /// Returns `Ok(false)` if the name is already present; nothing changes in
    /// that case. Of any number of concurrent claims for one name, exactly one
    /// returns `Ok(true)`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_claim(&self, name: ScreenName, owner: ClientId) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Claim {
                name,
                owner,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Attach `outbound` to a name claimed by `owner`, making it routable.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn activate(
        &self,
        name: ScreenName,
        owner: ClientId,
        outbound: Outbound,
    ) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Activate {
                name,
                owner,
                outbound,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Remove `name` if `owner` holds it.
    ///
    /// Returns `true` if an entry was removed. Safe to call repeatedly and
    /// safe to call after another client has claimed the same name: only the
    /// owner's own entry is ever removed. Returns `false` if the actor is gone.
    pub async fn release(&self, name: ScreenName, owner: ClientId) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Release {
                name,
                owner,
                respond_to: Some(tx),
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Fire-and-forget release usable from synchronous code (`Drop`).
    ///
    /// Tries to enqueue immediately; if the mailbox is full, hands the send to
    /// a spawned task when a runtime is available.
    pub fn release_detached(&self, name: ScreenName, owner: ClientId) {
        let cmd = RegistryCommand::Release {
            name,
            owner,
            respond_to: None,
        };

        match self.sender.try_send(cmd) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let sender = self.sender.clone();
                    runtime.spawn(async move {
                        let _ = sender.send(cmd).await;
                    });
                } else {
                    debug!(client_id = %owner, "No runtime available for detached release");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(client_id = %owner, "Registry closed before detached release");
            }
        }
    }

    /// Resolve a name to its outbound queue.
    ///
    /// Returns `None` if the name is absent, only reserved, or if
    /// communication with the actor fails.
    pub async fn lookup(&self, name: &str) -> Option<Outbound> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Lookup {
                name: name.to_string(),
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Point-in-time copy of every active name, sorted.
    ///
    /// Returns an empty set if communication with the actor fails.
    pub async fn snapshot_names(&self) -> BTreeSet<ScreenName> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::SnapshotNames { respond_to: tx })
            .await
            .is_err()
        {
            return BTreeSet::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Point-in-time copy of every active name with its outbound queue.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn recipients(&self) -> Vec<(ScreenName, Outbound)> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Recipients { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of entries, reserved and active.
    ///
    /// Returns 0 if communication with the actor fails.
    pub async fn count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Count { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Subscribe to registry events.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn create_test_handle() -> (RegistryHandle, mpsc::Receiver<RegistryCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let handle = RegistryHandle::new(cmd_tx, event_tx);
        (handle, cmd_rx)
    }

    fn name(s: &str) -> ScreenName {
        ScreenName::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_try_claim_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::Claim {
                name,
                owner,
                respond_to,
            }) = rx.recv().await
            {
                assert_eq!(name.as_str(), "alice");
                assert_eq!(owner, ClientId::new(7));
                let _ = respond_to.send(true);
                return true;
            }
            false
        });

        let result = handle.try_claim(name("alice"), ClientId::new(7)).await;
        assert_eq!(result, Ok(true));
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_try_claim_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.try_claim(name("alice"), ClientId::new(1)).await;
        assert_eq!(result, Err(RegistryError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_activate_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let (outbound, _queue) = crate::outbound::channel(1, CancellationToken::new());
        let result = handle.activate(name("alice"), ClientId::new(1), outbound).await;
        assert_eq!(result, Err(RegistryError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_queries_degrade_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.lookup("alice").await.is_none());
        assert!(handle.snapshot_names().await.is_empty());
        assert!(handle.recipients().await.is_empty());
        assert_eq!(handle.count().await, 0);
        assert!(!handle.release(name("alice"), ClientId::new(1)).await);
    }

    #[tokio::test]
    async fn test_release_detached_is_fire_and_forget() {
        let (handle, mut rx) = create_test_handle();

        handle.release_detached(name("alice"), ClientId::new(3));

        match rx.recv().await {
            Some(RegistryCommand::Release {
                name,
                owner,
                respond_to,
            }) => {
                assert_eq!(name.as_str(), "alice");
                assert_eq!(owner, ClientId::new(3));
                assert!(respond_to.is_none());
            }
            other => panic!("Expected Release, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_release_detached_ignores_closed_channel() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        // Should not panic or error
        handle.release_detached(name("alice"), ClientId::new(1));
    }

    #[tokio::test]
    async fn test_is_connected() {
        let (handle, rx) = create_test_handle();

        assert!(handle.is_connected());
        drop(rx);
        assert!(!handle.is_connected());
    }
}
