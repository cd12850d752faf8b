//! Remote Catalog Viewer: the file list of the currently selected peer.

use crate::download::DownloadState;
use crate::error::{Error, Result};
use crate::session::{CatalogView, Session};
use lanshare_api::{Backend, FileEntry, Peer};
use std::sync::Arc;

#[derive(Clone)]
pub struct CatalogViewer {
    backend: Arc<dyn Backend>,
    session: Session,
}

impl CatalogViewer {
    pub fn new(backend: Arc<dyn Backend>, session: Session) -> Self {
        Self { backend, session }
    }

    /// Make `peer` the active selection and load its catalog.
    ///
    /// Selections may overlap. Only the most recent one is allowed to
    /// write the view; an older response that arrives late is dropped and
    /// reported as `Ok(None)`.
    pub async fn select_peer(&self, peer: Peer) -> Result<Option<Vec<FileEntry>>> {
        let seq = self.session.write(|s| {
            s.catalog_seq += 1;
            s.selected_peer = Some(peer.clone());
            s.catalog = CatalogView::Loading;
            s.password_prompt = false;
            if s.download == DownloadState::PasswordPrompted {
                s.download = DownloadState::Idle;
            }
            s.catalog_seq
        });
        tracing::info!("Selected peer: {}", peer);

        let result = self.backend.list_peer_files(&peer.address, peer.port).await;

        self.session.write(|s| {
            if s.catalog_seq != seq {
                tracing::debug!("Discarding stale catalog response from {}", peer);
                return Ok(None);
            }
            match result {
                Ok(files) => {
                    tracing::debug!("{} shares {} file(s)", peer.username, files.len());
                    s.catalog = CatalogView::Loaded(files.clone());
                    Ok(Some(files))
                }
                Err(e) => {
                    tracing::error!("Error fetching remote files from {}: {}", peer, e);
                    s.catalog = CatalogView::Failed(e.to_string());
                    Err(Error::from(e))
                }
            }
        })
    }

    /// Reload the catalog of the current selection.
    pub async fn refresh(&self) -> Result<Option<Vec<FileEntry>>> {
        let peer = self
            .session
            .selected_peer()
            .ok_or(Error::InvalidState("no peer selected"))?;
        self.select_peer(peer).await
    }
}
