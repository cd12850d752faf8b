//! High-level client that wires the session components to one backend.
//!
//! All components share a single [`Session`]. Polling starts as soon as an
//! identity is known, whether resumed from the backend or claimed here.

use crate::catalog::CatalogViewer;
use crate::config::ClientConfig;
use crate::download::DownloadNegotiator;
use crate::error::Result;
use crate::identity::IdentityManager;
use crate::net;
use crate::roster::RosterSync;
use crate::session::Session;
use crate::share::ShareManager;
use crate::sink::{DirectorySink, FileSink};
use lanshare_api::{Backend, HttpBackend};
use std::sync::Arc;

#[derive(Clone)]
pub struct Client {
    session: Session,
    identity: IdentityManager,
    roster: RosterSync,
    catalog: CatalogViewer,
    shares: ShareManager,
    downloads: DownloadNegotiator,
}

impl Client {
    pub fn new(
        cfg: &ClientConfig,
        backend: Arc<dyn Backend>,
        sink: Arc<dyn FileSink>,
        own_hosts: Vec<String>,
    ) -> Self {
        let session = Session::new();
        let roster = RosterSync::new(
            backend.clone(),
            session.clone(),
            cfg.poll_intervals(),
            own_hosts,
        );
        Self {
            identity: IdentityManager::new(backend.clone(), session.clone()),
            catalog: CatalogViewer::new(backend.clone(), session.clone()),
            shares: ShareManager::new(backend.clone(), session.clone(), roster.clone()),
            downloads: DownloadNegotiator::new(backend, session.clone(), sink)
                .with_password_recheck(cfg.recheck_password),
            roster,
            session,
        }
    }

    /// Build a client against the HTTP backend named in `cfg`, saving
    /// downloads into `cfg.download_dir`.
    pub fn connect(cfg: &ClientConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let backend = HttpBackend::new(&cfg.api_base_url, cfg.connect_timeout())?;
        let own_hosts = net::local_hosts(backend.base_url().host_str());
        tracing::debug!("Backend at {}, local hosts {:?}", backend.base_url(), own_hosts);

        let sink = DirectorySink::new(cfg.download_dir.clone());
        Ok(Self::new(cfg, Arc::new(backend), Arc::new(sink), own_hosts))
    }

    /// Adopt the backend's existing username, if any, and start polling.
    pub async fn resolve_identity(&self) -> Option<String> {
        let name = self.identity.resolve().await?;
        if let Err(e) = self.roster.start().await {
            tracing::warn!("Could not start periodic fetching: {}", e);
        }
        Some(name)
    }

    /// Claim a username and start polling right away.
    pub async fn set_identity(&self, name: &str) -> Result<String> {
        let accepted = self.identity.set(name).await?;
        self.roster.start().await?;
        Ok(accepted)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn identity(&self) -> &IdentityManager {
        &self.identity
    }

    pub fn roster(&self) -> &RosterSync {
        &self.roster
    }

    pub fn catalog(&self) -> &CatalogViewer {
        &self.catalog
    }

    pub fn shares(&self) -> &ShareManager {
        &self.shares
    }

    pub fn downloads(&self) -> &DownloadNegotiator {
        &self.downloads
    }

    /// Stop background polling.
    pub fn shutdown(&self) {
        self.roster.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{DownloadOutcome, DownloadState};
    use crate::fake::{file, peer, FakeBackend};
    use crate::session::CatalogView;
    use lanshare_api::{ApiError, FileId};
    use tempfile::TempDir;

    fn client(backend: Arc<FakeBackend>, dir: &TempDir) -> Client {
        let cfg = ClientConfig::default().with_download_dir(dir.path().to_path_buf());
        let sink = DirectorySink::new(cfg.download_dir.clone());
        Client::new(&cfg, backend, Arc::new(sink), vec!["192.168.1.10".to_string()])
    }

    #[tokio::test]
    async fn test_set_identity_starts_polling() {
        let temp = TempDir::new().unwrap();
        let backend = FakeBackend::with(|s| s.peers = vec![peer("bob", "192.168.1.11")]);
        let client = client(backend.clone(), &temp);

        assert_eq!(client.set_identity("alice").await.unwrap(), "alice");
        assert_eq!(backend.count("GET /peers"), 1);
        assert_eq!(backend.count("GET /shared_files"), 1);
        assert_eq!(client.session().peers().len(), 1);
        assert!(client.roster().is_running());

        client.shutdown();
        assert!(!client.roster().is_running());
    }

    #[tokio::test]
    async fn test_placeholder_identity_does_not_poll() {
        let temp = TempDir::new().unwrap();
        let backend = FakeBackend::with(|s| s.username = Some("DefaultUser".into()));
        let client = client(backend.clone(), &temp);

        assert_eq!(client.resolve_identity().await, None);
        assert!(!client.session().has_identity());
        assert_eq!(backend.calls(), vec!["GET /identity".to_string()]);
        assert!(!client.roster().is_running());
    }

    #[tokio::test]
    async fn test_unreachable_identity_does_not_poll() {
        let temp = TempDir::new().unwrap();
        let backend = FakeBackend::with(|s| {
            s.identity_get_error = Some(ApiError::Transport("connection refused".into()));
        });
        let client = client(backend.clone(), &temp);

        assert_eq!(client.resolve_identity().await, None);
        assert!(!client.session().has_identity());
        assert!(!client.roster().is_running());
        assert_eq!(backend.count("GET /peers"), 0);
        assert_eq!(backend.count("GET /shared_files"), 0);
    }

    #[tokio::test]
    async fn test_resumed_identity_browse_and_download() {
        let temp = TempDir::new().unwrap();
        let backend = FakeBackend::with(|s| {
            s.username = Some("alice".into());
            s.peers = vec![peer("bob", "192.168.1.11")];
            s.catalogs.insert(
                "192.168.1.11".into(),
                vec![file("1", "notes.txt", false), file("2", "vault.zip", true)],
            );
            s.passwords.insert(FileId::from("2"), "hunter2".into());
            s.contents.insert(FileId::from("2"), b"zipped".to_vec());
        });
        let client = client(backend.clone(), &temp);

        assert_eq!(client.resolve_identity().await.as_deref(), Some("alice"));
        let bob = client.session().peers()[0].clone();
        let files = client.catalog().select_peer(bob.clone()).await.unwrap().unwrap();
        assert!(matches!(client.session().catalog(), CatalogView::Loaded(_)));

        let outcome = client.downloads().request_download(&bob, &files[1]).await.unwrap();
        assert_eq!(outcome, DownloadOutcome::PasswordRequired);

        let path = match client.downloads().submit_password("hunter2").await.unwrap() {
            DownloadOutcome::Completed(path) => path,
            other => panic!("expected a completed download, got {:?}", other),
        };
        assert_eq!(path, temp.path().join("vault.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"zipped");
        assert!(matches!(client.session().download_state(), DownloadState::Completed { .. }));

        client.shutdown();
    }
}
