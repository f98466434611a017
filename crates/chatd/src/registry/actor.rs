//! Registry actor - owns the screen name table and processes commands.
//!
//! The RegistryActor is the single owner of the name table. It receives
//! commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures (caller gone) are ignored, never panicked on

use std::collections::{BTreeSet, HashMap};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use chat_core::{ClientId, ScreenName};

use super::commands::{RegistryCommand, RegistryEvent};
use crate::outbound::Outbound;

/// One row of the name table.
#[derive(Debug)]
struct Entry {
    /// Connection that claimed the name
    owner: ClientId,

    /// Routing handle; `None` while the name is only reserved
    outbound: Option<Outbound>,
}

/// The registry actor - owns all name bindings.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to observers.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially.
/// A claim's membership check and insert happen inside one command, so two
/// racing claimants for the same name are serialized by the mailbox and
/// exactly one of them wins. Queries copy out of the table, so callers never
/// observe a table that is mid-update.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Name → entry
    entries: HashMap<ScreenName, Entry>,

    /// Event publisher for observers
    event_publisher: broadcast::Sender<RegistryEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<RegistryEvent>,
    ) -> Self {
        Self {
            receiver,
            entries: HashMap::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(entries = self.entries.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Claim {
                name,
                owner,
                respond_to,
            } => {
                let result = self.handle_claim(name, owner);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Activate {
                name,
                owner,
                outbound,
                respond_to,
            } => {
                let result = self.handle_activate(name, owner, outbound);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Release {
                name,
                owner,
                respond_to,
            } => {
                let result = self.handle_release(name, owner);
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(result);
                }
            }
            RegistryCommand::Lookup { name, respond_to } => {
                let _ = respond_to.send(self.handle_lookup(&name));
            }
            RegistryCommand::SnapshotNames { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot_names());
            }
            RegistryCommand::Recipients { respond_to } => {
                let _ = respond_to.send(self.handle_recipients());
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.entries.len());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_claim(&mut self, name: ScreenName, owner: ClientId) -> bool {
        if let Some(existing) = self.entries.get(&name) {
            debug!(
                name = %name,
                client_id = %owner,
                holder = %existing.owner,
                "Name already taken"
            );
            return false;
        }

        self.entries.insert(
            name.clone(),
            Entry {
                owner,
                outbound: None,
            },
        );

        info!(
            name = %name,
            client_id = %owner,
            total = self.entries.len(),
            "Name claimed"
        );

        let _ = self
            .event_publisher
            .send(RegistryEvent::Claimed { name, owner });
        true
    }

    fn handle_activate(&mut self, name: ScreenName, owner: ClientId, outbound: Outbound) -> bool {
        match self.entries.get_mut(&name) {
            Some(entry) if entry.owner == owner => {
                entry.outbound = Some(outbound);
                debug!(name = %name, client_id = %owner, "Name activated");
                let _ = self
                    .event_publisher
                    .send(RegistryEvent::Activated { name, owner });
                true
            }
            Some(entry) => {
                debug!(
                    name = %name,
                    client_id = %owner,
                    holder = %entry.owner,
                    "Refusing to activate a name owned by another client"
                );
                false
            }
            None => {
                debug!(name = %name, client_id = %owner, "Cannot activate unclaimed name");
                false
            }
        }
    }

    fn handle_release(&mut self, name: ScreenName, owner: ClientId) -> bool {
        match self.entries.get(&name) {
            Some(entry) if entry.owner == owner => {
                self.entries.remove(&name);
                info!(
                    name = %name,
                    client_id = %owner,
                    total = self.entries.len(),
                    "Name released"
                );
                let _ = self
                    .event_publisher
                    .send(RegistryEvent::Released { name, owner });
                true
            }
            Some(entry) => {
                debug!(
                    name = %name,
                    client_id = %owner,
                    holder = %entry.owner,
                    "Ignoring release of a name now held by another client"
                );
                false
            }
            None => false,
        }
    }

    fn handle_lookup(&self, name: &str) -> Option<Outbound> {
        self.entries
            .get(name)
            .and_then(|entry| entry.outbound.clone())
    }

    fn handle_snapshot_names(&self) -> BTreeSet<ScreenName> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.outbound.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn handle_recipients(&self) -> Vec<(ScreenName, Outbound)> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| {
                entry
                    .outbound
                    .as_ref()
                    .map(|outbound| (name.clone(), outbound.clone()))
            })
            .collect()
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of entries, reserved and active.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound;
    use tokio_util::sync::CancellationToken;

    fn create_actor() -> (RegistryActor, broadcast::Receiver<RegistryEvent>) {
        let (_cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);
        (RegistryActor::new(cmd_rx, event_tx), event_rx)
    }

    fn name(s: &str) -> ScreenName {
        ScreenName::parse(s).unwrap()
    }

    fn queue() -> (Outbound, outbound::OutboundReceiver) {
        outbound::channel(4, CancellationToken::new())
    }

    #[test]
    fn test_claim_then_duplicate_fails() {
        let (mut actor, mut events) = create_actor();

        assert!(actor.handle_claim(name("alice"), ClientId::new(1)));
        assert!(!actor.handle_claim(name("alice"), ClientId::new(2)));
        assert_eq!(actor.entry_count(), 1);

        assert_eq!(
            events.try_recv().unwrap(),
            RegistryEvent::Claimed {
                name: name("alice"),
                owner: ClientId::new(1),
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_reserved_name_is_not_routable() {
        let (mut actor, _events) = create_actor();

        actor.handle_claim(name("alice"), ClientId::new(1));

        assert!(actor.handle_lookup("alice").is_none());
        assert!(actor.handle_snapshot_names().is_empty());
        assert!(actor.handle_recipients().is_empty());
    }

    #[test]
    fn test_activate_makes_name_routable() {
        let (mut actor, _events) = create_actor();
        let (tx, _rx) = queue();

        actor.handle_claim(name("alice"), ClientId::new(1));
        assert!(actor.handle_activate(name("alice"), ClientId::new(1), tx.clone()));

        let found = actor.handle_lookup("alice").unwrap();
        assert!(found.same_queue(&tx));
        assert_eq!(
            actor.handle_snapshot_names().into_iter().collect::<Vec<_>>(),
            vec![name("alice")]
        );
        assert_eq!(actor.handle_recipients().len(), 1);
    }

    #[test]
    fn test_activate_rejects_foreign_owner_and_unclaimed_name() {
        let (mut actor, _events) = create_actor();
        let (tx, _rx) = queue();

        assert!(!actor.handle_activate(name("ghost"), ClientId::new(1), tx.clone()));

        actor.handle_claim(name("alice"), ClientId::new(1));
        assert!(!actor.handle_activate(name("alice"), ClientId::new(2), tx));
        assert!(actor.handle_lookup("alice").is_none());
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut actor, _events) = create_actor();

        actor.handle_claim(name("alice"), ClientId::new(1));
        assert!(actor.handle_release(name("alice"), ClientId::new(1)));
        assert!(!actor.handle_release(name("alice"), ClientId::new(1)));
        assert_eq!(actor.entry_count(), 0);
    }

    #[test]
    fn test_stale_release_does_not_remove_new_owner() {
        let (mut actor, _events) = create_actor();

        actor.handle_claim(name("alice"), ClientId::new(1));
        actor.handle_release(name("alice"), ClientId::new(1));
        actor.handle_claim(name("alice"), ClientId::new(2));

        // Late second release from the first session.
        assert!(!actor.handle_release(name("alice"), ClientId::new(1)));
        assert_eq!(actor.entry_count(), 1);
        assert!(!actor.handle_claim(name("alice"), ClientId::new(3)));
    }

    #[test]
    fn test_snapshot_is_sorted_copy() {
        let (mut actor, _events) = create_actor();
        let (tx, _rx) = queue();

        for (i, n) in ["carol", "alice", "bob"].into_iter().enumerate() {
            let owner = ClientId::new(i as u64);
            actor.handle_claim(name(n), owner);
            actor.handle_activate(name(n), owner, tx.clone());
        }

        let snapshot = actor.handle_snapshot_names();
        actor.handle_release(name("bob"), ClientId::new(2));

        let names: Vec<_> = snapshot.iter().map(ScreenName::as_str).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(actor.handle_snapshot_names().len(), 2);
    }

    #[tokio::test]
    async fn test_run_processes_commands_until_closed() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let task = tokio::spawn(RegistryActor::new(cmd_rx, event_tx).run());

        let (respond_to, rx) = tokio::sync::oneshot::channel();
        cmd_tx
            .send(RegistryCommand::Claim {
                name: name("alice"),
                owner: ClientId::new(1),
                respond_to,
            })
            .await
            .unwrap();
        assert!(rx.await.unwrap());

        let (respond_to, rx) = tokio::sync::oneshot::channel();
        cmd_tx
            .send(RegistryCommand::Count { respond_to })
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), 1);

        drop(cmd_tx);
        task.await.unwrap();
    }
}
