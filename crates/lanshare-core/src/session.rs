//! Session context shared by every component.
//!
//! All mutable client state lives here instead of in the components, so
//! transitions are explicit and a component never needs to reach into
//! another. Locks are never held across an `.await`.

use crate::download::DownloadState;
use crate::error::{Error, Result};
use lanshare_api::{FileEntry, FileId, Peer};
use parking_lot::RwLock;
use std::sync::Arc;

/// What the remote catalog pane shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CatalogView {
    #[default]
    NoSelection,
    Loading,
    /// May be empty: the peer shares nothing.
    Loaded(Vec<FileEntry>),
    Failed(String),
}

impl CatalogView {
    pub fn entries(&self) -> &[FileEntry] {
        match self {
            CatalogView::Loaded(files) => files,
            _ => &[],
        }
    }
}

/// A download that is waiting for a password or about to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    pub peer_address: String,
    pub peer_port: u16,
    pub file_id: FileId,
    pub file_name: String,
    pub needs_password: bool,
}

impl PendingDownload {
    pub fn new(peer: &Peer, file: &FileEntry) -> Self {
        Self {
            peer_address: peer.address.clone(),
            peer_port: peer.port,
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            needs_password: file.has_password,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub identity: Option<String>,
    pub peers: Vec<Peer>,
    /// Bumped when a roster request is issued; only the latest one's
    /// response is applied.
    pub peers_seq: u64,
    pub own_files: Vec<FileEntry>,
    /// Same as `peers_seq`, for our own share list. Polls and the refresh
    /// after a share or unshare go through the same counter.
    pub own_files_seq: u64,
    pub selected_peer: Option<Peer>,
    pub catalog: CatalogView,
    /// Bumped on every peer selection; a catalog response is applied only
    /// if the counter has not moved since its request was issued.
    pub catalog_seq: u64,
    pub pending: Option<PendingDownload>,
    pub download: DownloadState,
    /// Same discipline as `catalog_seq`, for download requests.
    pub download_seq: u64,
    pub password_prompt: bool,
}

#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<String> {
        self.inner.read().identity.clone()
    }

    pub fn has_identity(&self) -> bool {
        self.inner.read().identity.is_some()
    }

    pub fn require_identity(&self) -> Result<String> {
        self.identity().ok_or(Error::NoIdentity)
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.inner.read().peers.clone()
    }

    pub fn own_files(&self) -> Vec<FileEntry> {
        self.inner.read().own_files.clone()
    }

    pub fn selected_peer(&self) -> Option<Peer> {
        self.inner.read().selected_peer.clone()
    }

    pub fn catalog(&self) -> CatalogView {
        self.inner.read().catalog.clone()
    }

    pub fn pending_download(&self) -> Option<PendingDownload> {
        self.inner.read().pending.clone()
    }

    pub fn download_state(&self) -> DownloadState {
        self.inner.read().download.clone()
    }

    pub fn password_prompt_visible(&self) -> bool {
        self.inner.read().password_prompt
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.inner.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Record the accepted username. Acceptance is one-way: once set it is
    /// never replaced. Returns false if an identity was already present.
    pub(crate) fn accept_identity(&self, username: String) -> bool {
        self.write(|s| {
            if s.identity.is_some() {
                return false;
            }
            s.identity = Some(username);
            true
        })
    }
}
