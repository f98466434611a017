//! Message routing on top of the registry.
//!
//! The dispatcher never writes to a socket and never waits on a recipient.
//! Every delivery is a non-blocking enqueue onto that recipient's bounded
//! outbound queue; a full or closed queue only affects that one recipient.

use chat_core::ScreenName;
use chat_protocol::ServerLine;
use tracing::{debug, warn};

use crate::config::OverflowPolicy;
use crate::outbound::{self, DeliveryError, Line, Outbound};
use crate::registry::RegistryHandle;

/// Result of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients the line was enqueued for
    pub delivered: usize,
    /// Recipients skipped because their queue was full or closed
    pub dropped: usize,
}

/// Result of a private message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateOutcome {
    /// Enqueued for the recipient.
    Delivered,
    /// No active client has that name; the message is discarded and the
    /// sender is not told.
    UnknownRecipient,
    /// The recipient exists but its queue was full or closed.
    Dropped,
}

/// Broadcast, private delivery and roster listing.
#[derive(Clone)]
pub struct Dispatcher {
    registry: RegistryHandle,
    overflow: OverflowPolicy,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry` that applies `overflow` to full queues.
    pub fn new(registry: RegistryHandle, overflow: OverflowPolicy) -> Self {
        Self { registry, overflow }
    }

    /// Returns the registry this dispatcher routes through.
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Delivers `line` to every active client, including the caller's own.
    ///
    /// Recipients are taken from one registry snapshot. The line is rendered
    /// once and shared.
    pub async fn broadcast(&self, line: &ServerLine) -> DeliveryReport {
        let rendered = outbound::render(line);
        let recipients = self.registry.recipients().await;
        let mut report = DeliveryReport::default();

        for (name, queue) in &recipients {
            if self.deliver(name, queue, rendered.clone()) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
            }
        }

        debug!(
            line = %rendered,
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast"
        );
        report
    }

    /// Delivers `body` from `from` to the client named `target` only.
    pub async fn send_private(&self, from: &ScreenName, target: &str, body: &str) -> PrivateOutcome {
        let Some(queue) = self.registry.lookup(target).await else {
            debug!(from = %from, target = %target, "Private message to unknown recipient dropped");
            return PrivateOutcome::UnknownRecipient;
        };

        let rendered = outbound::render(&ServerLine::private(from, body));
        if self.deliver_to(target, &queue, rendered) {
            debug!(from = %from, target = %target, "Private message delivered");
            PrivateOutcome::Delivered
        } else {
            PrivateOutcome::Dropped
        }
    }

    /// Renders the current roster as a `GET_USERS` response line.
    pub async fn list_users(&self) -> ServerLine {
        ServerLine::roster(self.registry.snapshot_names().await)
    }

    fn deliver(&self, name: &ScreenName, queue: &Outbound, line: Line) -> bool {
        self.deliver_to(name.as_str(), queue, line)
    }

    /// Enqueues without waiting and applies the overflow policy.
    fn deliver_to(&self, name: &str, queue: &Outbound, line: Line) -> bool {
        match queue.try_deliver(line) {
            Ok(()) => true,
            Err(DeliveryError::Full) => {
                match self.overflow {
                    OverflowPolicy::Drop => {
                        warn!(recipient = %name, "Outbound queue full, line dropped");
                    }
                    OverflowPolicy::Disconnect => {
                        warn!(recipient = %name, "Outbound queue full, disconnecting recipient");
                        queue.kick();
                    }
                }
                false
            }
            Err(DeliveryError::Closed) => {
                // The recipient's own session is already terminating and will
                // release its name.
                debug!(recipient = %name, "Outbound queue closed, line skipped");
                false
            }
        }
    }
}
