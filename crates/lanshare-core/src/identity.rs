use crate::error::{Error, Result};
use crate::session::Session;
use lanshare_api::Backend;
use std::sync::Arc;

/// Usernames the backend reports before anyone has picked one.
const PLACEHOLDER_USERNAMES: &[&str] = &["DefaultUser", "ServerTestUser", "DummyUser"];

/// True if `name` is a real, user-chosen username.
pub fn is_valid_username(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && !PLACEHOLDER_USERNAMES.contains(&name)
}

/// Resolves the session's single username and records it in the session.
#[derive(Clone)]
pub struct IdentityManager {
    backend: Arc<dyn Backend>,
    session: Session,
}

impl IdentityManager {
    pub fn new(backend: Arc<dyn Backend>, session: Session) -> Self {
        Self { backend, session }
    }

    /// Adopt the username the backend already holds, if it is a real one.
    /// Any failure leaves the identity unset.
    pub async fn resolve(&self) -> Option<String> {
        if let Some(current) = self.session.identity() {
            return Some(current);
        }

        let username = match self.backend.get_identity().await {
            Ok(Some(name)) if is_valid_username(&name) => name,
            Ok(other) => {
                tracing::debug!("No usable identity on backend: {:?}", other);
                return None;
            }
            Err(e) => {
                tracing::warn!("Could not fetch initial identity: {}", e);
                return None;
            }
        };

        self.session.accept_identity(username.clone());
        tracing::info!("Resuming with username: {}", username);
        self.session.identity()
    }

    /// Claim `name` for this session. The backend may normalize it; the
    /// name it returns is the one recorded.
    pub async fn set(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Please enter a username."));
        }
        if let Some(current) = self.session.identity() {
            return Err(Error::IdentityLocked(current));
        }

        let accepted = self.backend.set_identity(name).await.map_err(|e| {
            tracing::error!("Error setting username: {}", e);
            Error::from(e)
        })?;

        // A concurrent resolve may have won the race; keep whichever landed first.
        if !self.session.accept_identity(accepted.clone()) {
            return Err(Error::IdentityLocked(self.session.identity().unwrap_or_default()));
        }
        tracing::info!("Username set to: {}", accepted);
        Ok(accepted)
    }
}
