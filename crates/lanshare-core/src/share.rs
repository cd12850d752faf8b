//! Share Manager: publish and revoke our own shares.

use crate::error::{Error, Result};
use crate::roster::RosterSync;
use crate::session::Session;
use lanshare_api::{Backend, FileId};
use std::sync::Arc;

/// One file in a batch share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub path: String,
    /// Empty for no password.
    pub password: String,
}

impl ShareRequest {
    pub fn new(path: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            password: password.into(),
        }
    }
}

/// Proof that the user was asked before a share is revoked. Obtained from
/// [`ShareManager::prepare_unshare`]; dropping it declines.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping the confirmation declines the unshare"]
pub struct UnshareConfirmation {
    id: FileId,
    name: Option<String>,
}

impl UnshareConfirmation {
    pub fn id(&self) -> &FileId {
        &self.id
    }

    /// The question to put to the user.
    pub fn prompt(&self) -> String {
        match &self.name {
            Some(name) => format!("Are you sure you want to stop sharing {}?", name),
            None => "Are you sure you want to stop sharing this file?".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ShareManager {
    backend: Arc<dyn Backend>,
    session: Session,
    roster: RosterSync,
}

impl ShareManager {
    pub fn new(backend: Arc<dyn Backend>, session: Session, roster: RosterSync) -> Self {
        Self {
            backend,
            session,
            roster,
        }
    }

    /// Share the file at `path` (a path on the backend's machine). On
    /// success the own-share list is refreshed before returning.
    pub async fn share_file(&self, path: &str, password: &str) -> Result<FileId> {
        self.session.require_identity()?;
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::Validation("Path is required."));
        }

        let id = self.backend.share_file(path, password).await.map_err(|e| {
            tracing::error!("Error sharing {}: {}", path, e);
            Error::from(e)
        })?;

        tracing::info!(
            "File {} is now shared (ID: {}{})",
            path,
            id,
            if password.is_empty() { "" } else { ", protected" }
        );
        self.refresh_own_files().await;
        Ok(id)
    }

    /// Share several files one after another. Each gets its own result; a
    /// failure does not stop the rest of the batch.
    pub async fn share_files(&self, requests: &[ShareRequest]) -> Vec<Result<FileId>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.share_file(&request.path, &request.password).await);
        }
        results
    }

    /// First step of unsharing: build the confirmation to show the user.
    /// Nothing is sent to the backend.
    pub fn prepare_unshare(&self, id: &FileId) -> Result<UnshareConfirmation> {
        self.session.require_identity()?;
        let name = self
            .session
            .read(|s| s.own_files.iter().find(|f| &f.id == id).map(|f| f.name.clone()));
        Ok(UnshareConfirmation {
            id: id.clone(),
            name,
        })
    }

    /// Second step, once the user said yes. On failure the entry stays
    /// listed.
    pub async fn confirm_unshare(&self, confirmation: UnshareConfirmation) -> Result<()> {
        self.session.require_identity()?;
        let id = confirmation.id;

        self.backend.unshare_file(&id).await.map_err(|e| {
            tracing::error!("Error unsharing file {}: {}", id, e);
            Error::from(e)
        })?;

        tracing::info!("File {} unshared", id);
        self.refresh_own_files().await;
        Ok(())
    }

    async fn refresh_own_files(&self) {
        // Failures are logged by the roster and the periodic poll will catch up.
        // Issuing a new request also voids any poll still in flight.
        let _ = self.roster.fetch_own_files().await;
    }
}
