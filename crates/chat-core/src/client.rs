//! Per-connection client identity.

use std::fmt;

/// Identifies one accepted connection for the lifetime of the server process.
///
/// Assigned from the listener's connection counter. The registry uses it as
/// the owner token of a claimed screen name, so a release issued by one
/// connection can never remove a name that another connection claimed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Wraps a raw connection number.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw connection number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}
