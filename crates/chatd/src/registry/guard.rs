//! Scoped ownership of a claimed screen name.

use chat_core::{ClientId, ScreenName};

use super::commands::RegistryError;
use super::handle::RegistryHandle;
use crate::outbound::Outbound;

/// A screen name held by one session.
///
/// Obtained from [`ClaimGuard::acquire`]. The owning session releases it with
/// [`ClaimGuard::release`] on every normal exit path; if the guard is dropped
/// without that (task cancelled or panicked), `Drop` issues a detached release
/// so the entry cannot outlive the session.
#[must_use = "dropping the guard releases the name"]
pub struct ClaimGuard {
    registry: RegistryHandle,
    name: ScreenName,
    owner: ClientId,
    released: bool,
}

impl ClaimGuard {
    /// Tries to claim `name` for `owner`.
    ///
    /// Returns `Ok(None)` if the name is taken.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the registry actor has shut down
    pub async fn acquire(
        registry: &RegistryHandle,
        name: ScreenName,
        owner: ClientId,
    ) -> Result<Option<Self>, RegistryError> {
        if !registry.try_claim(name.clone(), owner).await? {
            return Ok(None);
        }

        Ok(Some(Self {
            registry: registry.clone(),
            name,
            owner,
            released: false,
        }))
    }

    /// The claimed screen name.
    pub fn name(&self) -> &ScreenName {
        &self.name
    }

    /// The connection that owns the claim.
    pub fn owner(&self) -> ClientId {
        self.owner
    }

    /// Makes the held name routable to `outbound`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the registry actor has shut down
    pub async fn activate(&self, outbound: Outbound) -> Result<bool, RegistryError> {
        self.registry
            .activate(self.name.clone(), self.owner, outbound)
            .await
    }

    /// Releases the name and waits for the registry to apply it.
    ///
    /// Returns `true` if this call removed the entry.
    pub async fn release(mut self) -> bool {
        self.released = true;
        self.registry.release(self.name.clone(), self.owner).await
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.released {
            self.registry
                .release_detached(self.name.clone(), self.owner);
        }
    }
}
