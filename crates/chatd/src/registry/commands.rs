//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `RegistryEvent`: Events published by the registry for observers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::collections::BTreeSet;

use chat_core::{ClientId, ScreenName};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::outbound::Outbound;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command that produces a result carries a oneshot channel for the
/// response. The actor handles one command at a time, which is what makes a
/// claim atomic with respect to every other claim.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Reserve a screen name for `owner` if nobody holds it.
    ///
    /// Responds `true` if the reservation was made, `false` if the name was
    /// already present (reserved or active). A reserved name is not routable
    /// until `Activate`.
    Claim {
        /// Candidate name
        name: ScreenName,
        /// Connection that will own the entry
        owner: ClientId,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// Attach the owner's outbound queue, making the name routable.
    ///
    /// Responds `false` if the name is absent or owned by another client.
    Activate {
        /// Name previously claimed by `owner`
        name: ScreenName,
        /// Connection that owns the entry
        owner: ClientId,
        /// Queue that broadcasts and private messages are delivered to
        outbound: Outbound,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// Remove the entry for `name` if it is owned by `owner`.
    ///
    /// Idempotent: releasing an absent name, or a name now held by a different
    /// client, changes nothing and responds `false`.
    Release {
        /// Name to release
        name: ScreenName,
        /// Connection that claims to own the entry
        owner: ClientId,
        /// Channel to send the result (`None` for fire-and-forget)
        respond_to: Option<oneshot::Sender<bool>>,
    },

    /// Resolve a name to its outbound queue.
    ///
    /// The name is raw text because it comes straight off the wire (a `PM`
    /// target). Reserved-but-inactive entries resolve to `None`.
    Lookup {
        /// Name to resolve
        name: String,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<Outbound>>,
    },

    /// Point-in-time copy of every active name.
    SnapshotNames {
        /// Channel to send the result
        respond_to: oneshot::Sender<BTreeSet<ScreenName>>,
    },

    /// Point-in-time copy of every active (name, queue) pair, for fan-out.
    Recipients {
        /// Channel to send the result
        respond_to: oneshot::Sender<Vec<(ScreenName, Outbound)>>,
    },

    /// Number of entries, reserved and active.
    Count {
        /// Channel to send the result
        respond_to: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The actor has shut down, so the command could not be answered.
    #[error("registry channel closed")]
    ChannelClosed,
}

// ============================================================================
// Registry Events
// ============================================================================

/// Events published by the registry to observers.
///
/// Nothing in the server depends on these for correctness; they exist for
/// diagnostics and for tests that need to wait until a session has cleaned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A name was reserved.
    Claimed {
        /// Reserved name
        name: ScreenName,
        /// Owning connection
        owner: ClientId,
    },

    /// A reserved name became routable.
    Activated {
        /// Activated name
        name: ScreenName,
        /// Owning connection
        owner: ClientId,
    },

    /// An entry was removed.
    Released {
        /// Released name
        name: ScreenName,
        /// Connection that owned it
        owner: ClientId,
    },
}

impl RegistryEvent {
    /// Returns the name the event is about.
    pub fn name(&self) -> &ScreenName {
        match self {
            Self::Claimed { name, .. } | Self::Activated { name, .. } | Self::Released { name, .. } => {
                name
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        assert_eq!(RegistryError::ChannelClosed.to_string(), "registry channel closed");
    }

    #[test]
    fn test_event_name() {
        let name = ScreenName::parse("alice").unwrap();
        let event = RegistryEvent::Released {
            name: name.clone(),
            owner: ClientId::new(1),
        };
        assert_eq!(event.name(), &name);
    }
}
